//! Read-only dashboard models
//!
//! Everything here reads committed rows only and never blocks the sweep.

use chrono::{DateTime, Utc};
use kpi_common::db::{HealthStatus, Indicator, IndicatorUnit, IndicatorValue};
use kpi_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::db::{execution_log, groups, indicators, values};
use crate::schedule::{Cadence, DueState};
use crate::scoring::{
    band_score, compliance_percent, trend, variation_percent, weighted_score, RollupStatus, ScoredMember, Trend,
};

pub use crate::db::execution_log::ExecutionStats;

/// Rollup scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Process,
    Objective,
    Tenant,
}

/// Score of one group; `score` is null when no member has data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupEntry {
    pub group_id: Uuid,
    pub code: String,
    pub name: String,
    pub score: Option<i64>,
    pub status: RollupStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueEntry {
    pub indicator_id: Uuid,
    pub code: String,
    pub name: String,
    pub expected_next: DateTime<Utc>,
    pub days_late: i64,
}

/// Indicator counts by latest status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_indicators: usize,
    pub ok: usize,
    pub warning: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub value: f64,
    pub target: Option<f64>,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorDetail {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: IndicatorUnit,
    pub decimals: u32,
    pub weight: f64,
    pub process: Option<GroupRef>,
    pub objectives: Vec<GroupRef>,
    pub latest_value: Option<f64>,
    pub target: Option<f64>,
    pub compliance_percent: Option<f64>,
    pub previous_value: Option<f64>,
    pub variation_percent: Option<f64>,
    pub trend: Trend,
    pub status: RollupStatus,
    pub last_update: Option<DateTime<Utc>>,
    /// Oldest period first
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveDashboard {
    pub summary: Summary,
    pub executive_score: Option<i64>,
    pub executive_status: RollupStatus,
    pub indicators: Vec<IndicatorDetail>,
}

/// Active indicators of a tenant with their periods, newest first
struct TenantSnapshot {
    indicators: Vec<Indicator>,
    values: HashMap<Uuid, Vec<IndicatorValue>>,
}

impl TenantSnapshot {
    async fn load(pool: &SqlitePool, tenant_id: Uuid) -> Result<Self> {
        let indicators = indicators::list_active_indicators(pool, tenant_id).await?;
        let values = values::list_tenant_values_desc(pool, tenant_id).await?;
        Ok(Self { indicators, values })
    }

    fn periods(&self, indicator_id: Uuid) -> &[IndicatorValue] {
        self.values.get(&indicator_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn latest(&self, indicator_id: Uuid) -> Option<&IndicatorValue> {
        self.periods(indicator_id).first()
    }

    fn member(&self, indicator: &Indicator) -> ScoredMember {
        let compliance = self
            .latest(indicator.id)
            .and_then(|v| compliance_percent(v.value, v.target, indicator.evaluation_direction));
        ScoredMember {
            compliance,
            weight: indicator.effective_weight(),
        }
    }

    /// Weighted score of the indicators accepted by `in_group`
    fn score<F>(&self, in_group: F) -> Option<i64>
    where
        F: Fn(&Indicator) -> bool,
    {
        weighted_score(
            self.indicators
                .iter()
                .filter(|indicator| in_group(indicator))
                .map(|indicator| self.member(indicator)),
        )
    }

    fn summary(&self) -> Summary {
        let mut summary = Summary {
            total_indicators: self.indicators.len(),
            ..Summary::default()
        };
        for indicator in &self.indicators {
            match self.latest(indicator.id).map(|v| v.status) {
                Some(HealthStatus::Ok) => summary.ok += 1,
                Some(HealthStatus::Warning) => summary.warning += 1,
                Some(HealthStatus::Critical) => summary.critical += 1,
                None => {}
            }
        }
        summary
    }
}

fn entry(group_id: Uuid, code: String, name: String, score: Option<i64>) -> RollupEntry {
    RollupEntry {
        group_id,
        code,
        name,
        score,
        status: band_score(score),
    }
}

/// Weighted compliance per process, per objective, or for the whole tenant
pub async fn compute_rollup(pool: &SqlitePool, tenant_id: Uuid, group_by: GroupBy) -> Result<Vec<RollupEntry>> {
    let snapshot = TenantSnapshot::load(pool, tenant_id).await?;

    match group_by {
        GroupBy::Tenant => {
            let tenant = groups::get_tenant(pool, tenant_id).await?;
            let score = snapshot.score(|_| true);
            Ok(vec![entry(tenant.id, tenant.code, tenant.name, score)])
        }
        GroupBy::Process => {
            let processes = groups::list_active_processes(pool, tenant_id).await?;
            Ok(processes
                .into_iter()
                .map(|process| {
                    let score = snapshot.score(|i| i.process_id == process.id);
                    entry(process.id, process.code, process.name, score)
                })
                .collect())
        }
        GroupBy::Objective => {
            let objectives = groups::list_active_objectives(pool, tenant_id).await?;
            let links = groups::list_objective_links(pool, tenant_id).await?;
            Ok(objectives
                .into_iter()
                .map(|objective| {
                    let score = snapshot.score(|i| {
                        links
                            .iter()
                            .any(|(indicator_id, linked)| *indicator_id == i.id && linked.id == objective.id)
                    });
                    entry(objective.id, objective.code, objective.name, score)
                })
                .collect())
        }
    }
}

/// Indicators whose next measurement was expected before `as_of`, most late first
///
/// Indicators without a cadence or without any recorded period are not
/// reported; a conflicting cadence is skipped with a warning.
pub async fn overdue(pool: &SqlitePool, tenant_id: Uuid, as_of: DateTime<Utc>) -> Result<Vec<OverdueEntry>> {
    let indicators = indicators::list_active_indicators(pool, tenant_id).await?;
    let last_ends = values::latest_period_ends(pool, tenant_id).await?;

    let mut overdue = Vec::new();
    for indicator in indicators {
        let cadence = match Cadence::for_indicator(&indicator) {
            Ok(Some(cadence)) => cadence,
            Ok(None) => continue,
            Err(e) => {
                warn!(indicator = %indicator.code, error = %e, "Skipping indicator in overdue report");
                continue;
            }
        };
        let Some(last_end) = last_ends.get(&indicator.id).copied() else {
            continue;
        };

        if let DueState::Due {
            expected_next,
            days_late,
        } = DueState::evaluate(Some(last_end), cadence, as_of)?
        {
            overdue.push(OverdueEntry {
                indicator_id: indicator.id,
                code: indicator.code,
                name: indicator.name,
                expected_next,
                days_late,
            });
        }
    }

    overdue.sort_by(|a, b| b.days_late.cmp(&a.days_late).then_with(|| a.code.cmp(&b.code)));
    Ok(overdue)
}

pub async fn summary(pool: &SqlitePool, tenant_id: Uuid) -> Result<Summary> {
    Ok(TenantSnapshot::load(pool, tenant_id).await?.summary())
}

/// Executive view: counts, tenant score and per-indicator detail
pub async fn executive(pool: &SqlitePool, tenant_id: Uuid) -> Result<ExecutiveDashboard> {
    let snapshot = TenantSnapshot::load(pool, tenant_id).await?;

    let processes: HashMap<Uuid, GroupRef> = groups::list_processes(pool, tenant_id)
        .await?
        .into_iter()
        .map(|p| (p.id, GroupRef { id: p.id, code: p.code, name: p.name }))
        .collect();

    let mut objectives: HashMap<Uuid, Vec<GroupRef>> = HashMap::new();
    for (indicator_id, objective) in groups::list_objective_links(pool, tenant_id).await? {
        objectives.entry(indicator_id).or_default().push(GroupRef {
            id: objective.id,
            code: objective.code,
            name: objective.name,
        });
    }

    let details = snapshot
        .indicators
        .iter()
        .map(|indicator| {
            let periods = snapshot.periods(indicator.id);
            let latest = periods.first();
            let previous = periods.get(1).map(|v| v.value);

            IndicatorDetail {
                id: indicator.id,
                code: indicator.code.clone(),
                name: indicator.name.clone(),
                unit: indicator.unit,
                decimals: indicator.decimals,
                weight: indicator.effective_weight(),
                process: processes.get(&indicator.process_id).cloned(),
                objectives: objectives.remove(&indicator.id).unwrap_or_default(),
                latest_value: latest.map(|v| v.value),
                target: latest.and_then(|v| v.target),
                compliance_percent: snapshot.member(indicator).compliance,
                previous_value: previous,
                variation_percent: latest.and_then(|v| variation_percent(v.value, previous)),
                trend: latest.map_or(Trend::NoData, |v| trend(v.value, previous)),
                status: latest.map_or(RollupStatus::NoData, |v| v.status.into()),
                last_update: latest.map(|v| v.period_end),
                history: periods
                    .iter()
                    .rev()
                    .map(|v| HistoryPoint {
                        period_start: v.period_start,
                        period_end: v.period_end,
                        value: v.value,
                        target: v.target,
                        status: v.status,
                    })
                    .collect(),
            }
        })
        .collect();

    let executive_score = snapshot.score(|_| true);
    Ok(ExecutiveDashboard {
        summary: snapshot.summary(),
        executive_score,
        executive_status: band_score(executive_score),
        indicators: details,
    })
}

pub async fn execution_stats(pool: &SqlitePool, tenant_id: Uuid) -> Result<ExecutionStats> {
    execution_log::stats(pool, tenant_id).await
}
