//! Outbound source calls
//!
//! `SourceFetcher` is the seam between the resolver and the network; the
//! service uses the reqwest-backed `HttpSourceFetcher`.

use async_trait::async_trait;
use kpi_common::db::{HttpMethod, Source};
use kpi_common::time::millis_to_duration;
use kpi_common::{Error, Result};

const USER_AGENT: &str = concat!("kpi-engine/", env!("CARGO_PKG_VERSION"));

/// Performs one outbound call for a source
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Call the source and return the raw response body
    ///
    /// Fails with `Error::Transport` on timeout, connection failure or a
    /// non-success HTTP status.
    async fn fetch(&self, source: &Source) -> Result<String>;
}

/// reqwest-backed fetcher honoring each source's method, headers,
/// query parameters, body template and timeout
#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    client: reqwest::Client,
}

impl HttpSourceFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &Source) -> Result<String> {
        let transport = |message: String| Error::Transport {
            source_id: source.id.to_string(),
            message,
        };

        let method = match source.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut request = self
            .client
            .request(method, &source.endpoint)
            .timeout(millis_to_duration(source.timeout_ms));

        if !source.query_params.is_empty() {
            request = request.query(&source.query_params);
        }
        for (name, value) in &source.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &source.body_template {
            request = request.json(body);
        }

        tracing::debug!(
            source_id = %source.id,
            endpoint = %source.endpoint,
            method = %source.method,
            "Calling source"
        );

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                transport(format!("timed out after {} ms", source.timeout_ms))
            } else {
                transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| transport(e.to_string()))
    }
}

/// Interpret a response body as a single numeric scalar
///
/// Accepts a JSON number, or a JSON string holding a number. Everything
/// else, including non-finite values, is `InvalidSourceResponse`.
pub fn parse_numeric(source_id: &str, body: &str) -> Result<f64> {
    let invalid = || Error::InvalidSourceResponse {
        source_id: source_id.to_string(),
        body: body.chars().take(200).collect(),
    };

    let parsed: serde_json::Value = serde_json::from_str(body.trim()).map_err(|_| invalid())?;
    let number = match parsed {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    number.filter(|n| n.is_finite()).ok_or_else(invalid)
}
