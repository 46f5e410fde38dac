//! Persisted domain model
//!
//! Enums are stored as their SCREAMING_SNAKE_CASE text form, which is also
//! their JSON representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Internal(format!(
                        "Unknown {} value: {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// Display unit of an indicator
    IndicatorUnit { Number => "NUMBER", Percent => "PERCENT" }
}

text_enum! {
    /// Which side of the target counts as healthy
    EvaluationDirection {
        HigherIsBetter => "HIGHER_IS_BETTER",
        LowerIsBetter => "LOWER_IS_BETTER",
    }
}

text_enum! {
    /// Health status assigned to a measurement period
    HealthStatus { Ok => "OK", Warning => "WARNING", Critical => "CRITICAL" }
}

text_enum! {
    /// How a source response contributes to an indicator value
    SourceRole {
        Data => "DATA",
        Numerator => "NUMERATOR",
        Denominator => "DENOMINATOR",
    }
}

text_enum! {
    /// Outbound HTTP method of a source
    HttpMethod {
        Get => "GET",
        Post => "POST",
        Put => "PUT",
        Patch => "PATCH",
        Delete => "DELETE",
    }
}

text_enum! {
    /// What started an evaluation attempt
    ExecutionTrigger { Manual => "MANUAL", Scheduled => "SCHEDULED" }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorType {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
}

/// A tracked KPI with a target-based evaluation rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub process_id: Uuid,
    pub indicator_type_id: Uuid,
    /// Unique per tenant
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: IndicatorUnit,
    pub decimals: u32,
    /// Aggregation weight; `None` counts as 1
    pub weight: Option<f64>,
    pub evaluation_direction: EvaluationDirection,
    pub frequency_days: Option<u32>,
    pub frequency_months: Option<u32>,
    pub active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Indicator {
    /// Weight used by rollups
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// One measurement period of an indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorValue {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub indicator_id: Uuid,
    pub value: f64,
    pub target: Option<f64>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub status: HealthStatus,
    pub created_at: DateTime<Utc>,
}

/// External data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub endpoint: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub body_template: Option<serde_json::Value>,
    pub timeout_ms: u64,
    pub active: bool,
}

/// Source attached to an indicator with a role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSource {
    pub id: Uuid,
    pub indicator_id: Uuid,
    pub role: SourceRole,
    pub source: Source,
}

/// Append-only audit record of an evaluation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub indicator_id: Uuid,
    pub trigger: ExecutionTrigger,
    pub status: HealthStatus,
    pub indicator_value_id: Option<Uuid>,
    pub message: Option<String>,
    pub executed_at: DateTime<Utc>,
}
