//! Chronological selection for `newest` and `oldest`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{QueryError, Result};
use crate::path;
use crate::value::{Number, Value};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parses a timestamp-like value.
///
/// Strings may be RFC 3339, RFC 2822, a naive `YYYY-MM-DD HH:MM:SS` (with
/// `T` or space, optional fraction, read as UTC), or a bare `YYYY-MM-DD`.
/// Numbers are Unix seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_str(s.trim()),
        Value::Number(n) => match Number::from_json(n) {
            Number::I64(secs) => DateTime::from_timestamp(secs, 0),
            Number::U64(secs) => DateTime::from_timestamp(i64::try_from(secs).ok()?, 0),
            Number::F64(secs) if secs.is_finite() => {
                DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
            }
            Number::F64(_) => None,
        },
        _ => None,
    }
}

fn parse_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Which end of the timeline to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    Newest,
    Oldest,
}

/// Picks the entry with the newest or oldest timestamp in `field`.
///
/// Every entry must carry the field; ties go to the earliest entry.
pub(crate) fn pick(entries: Vec<Value>, field: &str, which: Pick) -> Result<Option<Value>> {
    let mut best: Option<(DateTime<Utc>, usize)> = None;

    for (index, entry) in entries.iter().enumerate() {
        let raw = path::resolve_value(entry, field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| QueryError::FieldNotFound {
                field: field.to_string(),
            })?;
        let at = parse_timestamp(raw).ok_or_else(|| QueryError::TimeParse {
            field: field.to_string(),
            value: raw.to_string(),
        })?;
        let better = match (best, which) {
            (None, _) => true,
            (Some((current, _)), Pick::Newest) => at > current,
            (Some((current, _)), Pick::Oldest) => at < current,
        };
        if better {
            best = Some((at, index));
        }
    }

    Ok(best.and_then(|(_, index)| entries.into_iter().nth(index)))
}
