//! Due-date projection from an indicator's cadence

use chrono::{DateTime, Duration, Months, Utc};
use kpi_common::db::Indicator;
use kpi_common::{Error, Result};

/// Measurement cadence of an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Days(u32),
    Months(u32),
}

impl Cadence {
    /// `Ok(None)` when the indicator has no cadence and is exempt from scheduling
    pub fn for_indicator(indicator: &Indicator) -> Result<Option<Self>> {
        match (indicator.frequency_days, indicator.frequency_months) {
            (Some(_), Some(_)) => Err(Error::Config(format!(
                "Indicator {} has both frequencyDays and frequencyMonths set",
                indicator.code
            ))),
            (Some(days), None) => Ok(Some(Cadence::Days(days))),
            (None, Some(months)) => Ok(Some(Cadence::Months(months))),
            (None, None) => Ok(None),
        }
    }

    /// Expected time of the next measurement after a period ending at `last_end`
    ///
    /// Month steps clamp to the last day of shorter months (Jan 31 + 1 month = Feb 28/29).
    pub fn expected_next(&self, last_end: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let next = match *self {
            Cadence::Days(days) => last_end.checked_add_signed(Duration::days(i64::from(days))),
            Cadence::Months(months) => last_end.checked_add_months(Months::new(months)),
        };
        next.ok_or_else(|| Error::Internal(format!("Next due date after {} is out of range", last_end)))
    }
}

/// Scheduling state of one indicator at an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueState {
    /// No measurement recorded yet
    FirstRun,
    Due {
        expected_next: DateTime<Utc>,
        days_late: i64,
    },
    NotDue {
        expected_next: DateTime<Utc>,
    },
}

impl DueState {
    pub fn evaluate(last_end: Option<DateTime<Utc>>, cadence: Cadence, now: DateTime<Utc>) -> Result<Self> {
        let Some(last_end) = last_end else {
            return Ok(DueState::FirstRun);
        };

        let expected_next = cadence.expected_next(last_end)?;
        if now > expected_next {
            Ok(DueState::Due {
                expected_next,
                days_late: days_late(expected_next, now),
            })
        } else {
            Ok(DueState::NotDue { expected_next })
        }
    }

    pub fn is_due(&self) -> bool {
        !matches!(self, DueState::NotDue { .. })
    }
}

/// Whole days elapsed since `expected_next`
pub fn days_late(expected_next: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - expected_next).num_days()
}
