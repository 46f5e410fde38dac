//! Weighted rollup of indicator compliance
//!
//! One algorithm for every grouping (tenant, process, objective); callers
//! decide which indicators belong to a group.

use kpi_common::db::HealthStatus;
use serde::Serialize;

/// Heatmap band of a rollup score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollupStatus {
    Ok,
    Warning,
    Critical,
    NoData,
}

impl From<HealthStatus> for RollupStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Ok => RollupStatus::Ok,
            HealthStatus::Warning => RollupStatus::Warning,
            HealthStatus::Critical => RollupStatus::Critical,
        }
    }
}

/// One indicator's contribution to a rollup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMember {
    /// Latest compliance percent; `None` (no value or no target) is skipped
    pub compliance: Option<f64>,
    pub weight: f64,
}

/// Weighted mean of the defined compliances, rounded
///
/// Returns `None` when nothing contributed; a group without data never
/// scores 0. Negative or non-finite weights are ignored so the score stays
/// within the compliance range.
pub fn weighted_score<I>(members: I) -> Option<i64>
where
    I: IntoIterator<Item = ScoredMember>,
{
    let (weighted_sum, total_weight) = members
        .into_iter()
        .filter(|m| m.weight.is_finite() && m.weight >= 0.0)
        .filter_map(|m| m.compliance.map(|c| (c, m.weight)))
        .fold((0.0_f64, 0.0_f64), |(sum, total), (compliance, weight)| {
            (sum + compliance * weight, total + weight)
        });

    if total_weight > 0.0 {
        Some((weighted_sum / total_weight).round() as i64)
    } else {
        None
    }
}

/// Band a rollup score: >=80 OK, >=60 WARNING, below CRITICAL, none NO_DATA
pub fn band_score(score: Option<i64>) -> RollupStatus {
    match score {
        None => RollupStatus::NoData,
        Some(s) if s >= 80 => RollupStatus::Ok,
        Some(s) if s >= 60 => RollupStatus::Warning,
        Some(_) => RollupStatus::Critical,
    }
}
