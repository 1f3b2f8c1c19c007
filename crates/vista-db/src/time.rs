use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// SQLite `datetime('now')` layout. Timestamps written from Rust use the same
/// layout so that string comparison in SQL orders them correctly.
const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable age of `created` relative to `now`.
pub fn time_ago(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - created).num_seconds();

    if seconds < 60 {
        "Just now".to_string()
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h ago", seconds / 3600)
    } else {
        format!("{}d ago", seconds / 86400)
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, SQLITE_FORMAT).map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(SQLITE_FORMAT).to_string()
}
