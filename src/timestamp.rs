//! UTC timestamp serialization contract.
//!
//! Timestamps travel as second-precision ISO-8601 strings and are always
//! converted to `DateTime<Utc>` at the boundary.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Wire format used for `IssueInstant` and persisted recheck values.
pub const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format an instant as `yyyy-MM-ddTHH:mm:ssZ`.
pub fn format_utc(instant: &DateTime<Utc>) -> String {
    instant.format(UTC_FORMAT).to_string()
}

/// Parse a timestamp into UTC.
///
/// Accepts RFC 3339 with any offset, or a naive `yyyy-MM-ddTHH:mm:ss` value
/// which is taken to be UTC.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Drop sub-second precision so an instant survives a format/parse cycle.
pub fn truncate_to_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    let secs = instant.timestamp();
    DateTime::from_timestamp(secs, 0).unwrap_or(instant)
}
