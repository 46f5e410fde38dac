//! Timestamp utilities
//!
//! Timestamps are persisted as fixed-width RFC 3339 UTC text
//! (`2026-01-01T00:00:00.000000Z`), so lexical order equals time order.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, SecondsFormat, SubsecRound, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Drop the sub-microsecond part that storage cannot keep
pub fn to_db_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Whether a timestamp fits the four-digit year of the storage format
pub fn is_storable(ts: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&ts.year())
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp {:?}: {}", raw, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(from_db).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::from_millis(0));
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
    }

    #[test]
    fn test_db_format_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(to_db(&a), "2026-01-01T00:00:00.000000Z");
        assert_eq!(to_db(&a).len(), to_db(&b).len());
        assert!(to_db(&a) < to_db(&b));
    }

    #[test]
    fn test_db_precision_matches_storage() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::nanoseconds(1_500);
        let stored = to_db_precision(ts);
        assert_eq!(stored.timestamp_subsec_nanos(), 1_000);
        assert_eq!(from_db(&to_db(&ts)).unwrap(), stored);
    }

    #[test]
    fn test_five_digit_years_not_storable() {
        assert!(is_storable(&Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()));
        assert!(!is_storable(&Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_db_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap();
        assert_eq!(from_db(&to_db(&ts)).unwrap(), ts);
    }

    #[test]
    fn test_from_db_rejects_garbage() {
        assert!(from_db("not a date").is_err());
        assert_eq!(from_db_opt(None).unwrap(), None);
    }
}
