//! Compliance percent, period-over-period variation and trend

use kpi_common::db::EvaluationDirection;
use serde::Serialize;

/// Direction of change against the previous period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
    Stable,
    /// Indicator has no recorded value at all
    NoData,
}

/// Normalized 0-100 closeness of `value` to `target`
///
/// `None` when there is no target, the target is 0, or (LOWER_IS_BETTER)
/// the value is 0.
pub fn compliance_percent(
    value: f64,
    target: Option<f64>,
    direction: EvaluationDirection,
) -> Option<f64> {
    let target = target.filter(|t| *t != 0.0)?;

    let raw = match direction {
        EvaluationDirection::HigherIsBetter => (value / target) * 100.0,
        EvaluationDirection::LowerIsBetter => {
            if value == 0.0 {
                return None;
            }
            (target / value) * 100.0
        }
    };

    if raw.is_nan() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0))
}

/// Percent change from `previous` to `current`; `None` without a usable baseline
pub fn variation_percent(current: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous.filter(|p| *p != 0.0)?;
    Some(((current - previous) / previous) * 100.0)
}

/// Trend of `current` against `previous`; STABLE when there is no previous period
pub fn trend(current: f64, previous: Option<f64>) -> Trend {
    match previous {
        Some(previous) if current > previous => Trend::Up,
        Some(previous) if current < previous => Trend::Down,
        _ => Trend::Stable,
    }
}
