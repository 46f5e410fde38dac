//! Value classification against a period target

use kpi_common::db::{EvaluationDirection, HealthStatus};

/// Lower band edge for HIGHER_IS_BETTER (`target * 0.9`)
const WARNING_FLOOR: f64 = 0.9;
/// Upper band edge for LOWER_IS_BETTER (`target * 1.1`)
const WARNING_CEILING: f64 = 1.1;

/// Classify a measured value against an optional target
///
/// Total over its domain. Without a target there is nothing to violate,
/// so the period is OK. A target of 0 collapses both warning bands to 0.
pub fn classify(value: f64, target: Option<f64>, direction: EvaluationDirection) -> HealthStatus {
    let Some(target) = target else {
        return HealthStatus::Ok;
    };

    match direction {
        EvaluationDirection::HigherIsBetter => {
            if value >= target {
                HealthStatus::Ok
            } else if value >= target * WARNING_FLOOR {
                HealthStatus::Warning
            } else {
                HealthStatus::Critical
            }
        }
        EvaluationDirection::LowerIsBetter => {
            if value <= target {
                HealthStatus::Ok
            } else if value <= target * WARNING_CEILING {
                HealthStatus::Warning
            } else {
                HealthStatus::Critical
            }
        }
    }
}
