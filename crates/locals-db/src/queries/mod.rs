mod bookings;
mod dms;
mod events;
mod reviews;
mod tags;
mod users;

pub use reviews::{MAX_RATING, MIN_RATING};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::{Result, StoreError};

/// Timestamps are stored as `YYYY-MM-DDTHH:MM:SSZ` so that string order in
/// SQL matches chronological order.
pub(crate) fn format_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') have no zone marker
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

/// Like `parse_ts`, but for columns that must hold a value.
pub(crate) fn parse_ts_or_epoch(raw: &str, what: &str, row_id: i64) -> DateTime<Utc> {
    parse_ts(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}' on row {}", what, raw, row_id);
        DateTime::default()
    })
}

/// Maps a UNIQUE/CHECK violation to a domain conflict; everything else passes through.
pub(crate) fn conflict_on_constraint(err: rusqlite::Error, message: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(message.to_string())
        }
        other => other.into(),
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2025, 1, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        assert!(format_ts(&early) < format_ts(&late));
        assert_eq!(format_ts(&late), "2025-01-10T00:00:00Z");
    }

    #[test]
    fn parses_both_stored_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_ts("2025-03-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_ts("2025-03-01 08:30:00"), Some(expected));
        assert_eq!(parse_ts("yesterday"), None);
    }
}
