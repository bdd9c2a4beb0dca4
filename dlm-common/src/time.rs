//! Timestamp utilities
//!
//! All timestamps are persisted as RFC 3339 UTC strings with millisecond
//! precision, so lexicographic order in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_db_timestamp_format_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(to_db_timestamp(ts), "2024-03-09T07:05:01.000Z");
    }

    #[test]
    fn test_db_timestamp_roundtrip_preserves_millis() {
        let ts = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let parsed = parse_db_timestamp(&to_db_timestamp(ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_db_timestamps_sort_chronologically() {
        let earlier = Utc.timestamp_millis_opt(1_700_000_000_999).unwrap();
        let later = Utc.timestamp_millis_opt(1_700_000_001_000).unwrap();
        assert!(to_db_timestamp(earlier) < to_db_timestamp(later));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_db_timestamp("yesterday"), Err(Error::Internal(_))));
    }
}
