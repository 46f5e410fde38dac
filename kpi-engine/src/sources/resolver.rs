//! Role-based combination of source responses
//!
//! An indicator's attached sources resolve once into a `SourcePlan`
//! (which sources to call), the calls produce a `SourceReading`
//! (what they answered), and the reading yields the final value.

use kpi_common::db::{IndicatorSource, Source, SourceRole};
use kpi_common::{Error, Result};

use super::fetcher::{parse_numeric, SourceFetcher};

/// Which sources to call for one indicator
#[derive(Debug, Clone, Copy)]
pub enum SourcePlan<'a> {
    /// One DATA source; its response is the value
    Data(&'a Source),
    /// Value is numerator / denominator
    Ratio {
        numerator: &'a Source,
        denominator: &'a Source,
    },
}

/// What the planned sources answered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceReading {
    Data(f64),
    Ratio { numerator: f64, denominator: f64 },
}

impl<'a> SourcePlan<'a> {
    /// Build the plan from attached sources, ignoring inactive ones
    ///
    /// Valid configurations are exactly one DATA source, or exactly one
    /// NUMERATOR plus one DENOMINATOR. Anything else is a configuration error.
    pub fn from_links(links: &'a [IndicatorSource]) -> Result<Self> {
        let by_role = |role: SourceRole| -> Vec<&'a Source> {
            links
                .iter()
                .filter(|l| l.role == role && l.source.active)
                .map(|l| &l.source)
                .collect()
        };

        let data = by_role(SourceRole::Data);
        let numerators = by_role(SourceRole::Numerator);
        let denominators = by_role(SourceRole::Denominator);

        match (data.as_slice(), numerators.as_slice(), denominators.as_slice()) {
            ([source], [], []) => Ok(SourcePlan::Data(*source)),
            ([], [numerator], [denominator]) => Ok(SourcePlan::Ratio {
                numerator: *numerator,
                denominator: *denominator,
            }),
            ([], [], []) => Err(Error::Config("Invalid source configuration: no active sources".to_string())),
            _ => Err(Error::Config(format!(
                "Invalid source configuration: {} DATA, {} NUMERATOR, {} DENOMINATOR \
                 (need one DATA, or one NUMERATOR and one DENOMINATOR)",
                data.len(),
                numerators.len(),
                denominators.len()
            ))),
        }
    }

    /// Call the planned sources; a ratio's two calls run concurrently
    pub async fn read(&self, fetcher: &dyn SourceFetcher) -> Result<SourceReading> {
        match self {
            SourcePlan::Data(source) => Ok(SourceReading::Data(read_one(fetcher, source).await?)),
            SourcePlan::Ratio {
                numerator,
                denominator,
            } => {
                let (numerator, denominator) =
                    tokio::try_join!(read_one(fetcher, numerator), read_one(fetcher, denominator))?;
                Ok(SourceReading::Ratio {
                    numerator,
                    denominator,
                })
            }
        }
    }
}

impl SourceReading {
    /// Final indicator value
    pub fn value(&self) -> Result<f64> {
        match *self {
            SourceReading::Data(value) => Ok(value),
            SourceReading::Ratio { denominator, .. } if denominator == 0.0 => Err(Error::DivisionByZero),
            SourceReading::Ratio {
                numerator,
                denominator,
            } => Ok(numerator / denominator),
        }
    }
}

async fn read_one(fetcher: &dyn SourceFetcher, source: &Source) -> Result<f64> {
    let body = fetcher.fetch(source).await?;
    parse_numeric(&source.id.to_string(), &body)
}

/// Compute an indicator's raw value from its attached sources
pub async fn resolve_value(links: &[IndicatorSource], fetcher: &dyn SourceFetcher) -> Result<f64> {
    let plan = SourcePlan::from_links(links)?;
    let reading = plan.read(fetcher).await?;
    reading.value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kpi_common::db::HttpMethod;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Answers by endpoint and records every call
    #[derive(Default)]
    struct StubFetcher {
        bodies: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn with(mut self, endpoint: &str, body: &str) -> Self {
            self.bodies.insert(endpoint.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        async fn fetch(&self, source: &Source) -> Result<String> {
            self.calls.lock().unwrap().push(source.endpoint.clone());
            self.bodies.get(&source.endpoint).cloned().ok_or_else(|| Error::Transport {
                source_id: source.id.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn link(endpoint: &str, role: SourceRole, active: bool) -> IndicatorSource {
        IndicatorSource {
            id: Uuid::new_v4(),
            indicator_id: Uuid::nil(),
            role,
            source: Source {
                id: Uuid::new_v4(),
                tenant_id: Uuid::nil(),
                name: endpoint.to_string(),
                description: None,
                endpoint: endpoint.to_string(),
                method: HttpMethod::Get,
                headers: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body_template: None,
                timeout_ms: 1000,
                active,
            },
        }
    }

    #[tokio::test]
    async fn test_data_source_value_used_directly() {
        let fetcher = StubFetcher::default().with("http://a", "12.5");
        let links = vec![link("http://a", SourceRole::Data, true)];

        assert_eq!(resolve_value(&links, &fetcher).await.unwrap(), 12.5);
    }

    #[tokio::test]
    async fn test_ratio_divides() {
        let fetcher = StubFetcher::default().with("http://n", "30").with("http://d", "40");
        let links = vec![
            link("http://n", SourceRole::Numerator, true),
            link("http://d", SourceRole::Denominator, true),
        ];

        assert_eq!(resolve_value(&links, &fetcher).await.unwrap(), 0.75);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_denominator_is_division_by_zero() {
        let fetcher = StubFetcher::default().with("http://n", "10").with("http://d", "0");
        let links = vec![
            link("http://n", SourceRole::Numerator, true),
            link("http://d", SourceRole::Denominator, true),
        ];

        let err = resolve_value(&links, &fetcher).await.unwrap_err();
        assert!(matches!(err, Error::DivisionByZero));
    }

    #[tokio::test]
    async fn test_non_numeric_body() {
        let fetcher = StubFetcher::default().with("http://a", "<html>oops</html>");
        let links = vec![link("http://a", SourceRole::Data, true)];

        let err = resolve_value(&links, &fetcher).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSourceResponse { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let fetcher = StubFetcher::default();
        let links = vec![link("http://down", SourceRole::Data, true)];

        let err = resolve_value(&links, &fetcher).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[test]
    fn test_plan_rejects_incomplete_and_mixed_configurations() {
        let cases = vec![
            vec![],
            vec![link("n", SourceRole::Numerator, true)],
            vec![link("d", SourceRole::Denominator, true)],
            vec![link("a", SourceRole::Data, true), link("b", SourceRole::Data, true)],
            vec![
                link("a", SourceRole::Data, true),
                link("n", SourceRole::Numerator, true),
                link("d", SourceRole::Denominator, true),
            ],
            vec![
                link("n1", SourceRole::Numerator, true),
                link("n2", SourceRole::Numerator, true),
                link("d", SourceRole::Denominator, true),
            ],
        ];

        for links in &cases {
            let err = SourcePlan::from_links(links).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{} links should be rejected", links.len());
        }
    }

    #[test]
    fn test_plan_ignores_inactive_sources() {
        let links = vec![
            link("old", SourceRole::Data, false),
            link("n", SourceRole::Numerator, true),
            link("d", SourceRole::Denominator, true),
        ];
        assert!(matches!(
            SourcePlan::from_links(&links).unwrap(),
            SourcePlan::Ratio { .. }
        ));

        let only_inactive = vec![link("old", SourceRole::Data, false)];
        assert!(SourcePlan::from_links(&only_inactive).is_err());
    }

    #[tokio::test]
    async fn test_misconfiguration_makes_no_calls() {
        let fetcher = StubFetcher::default().with("http://n", "1");
        let links = vec![link("http://n", SourceRole::Numerator, true)];

        assert!(resolve_value(&links, &fetcher).await.is_err());
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }
}
