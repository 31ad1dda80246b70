//! Dotted field paths.
//!
//! A path like `category.name` walks nested objects one segment at a time.
//! A flat field name is simply a one-segment path.

use crate::value::{Record, Value};

static NULL: Value = Value::Null;

/// Resolves a dotted path against a record.
///
/// Returns `None` when any segment is absent or an intermediate value is not
/// an object. An explicit JSON `null` at the end of the path resolves to
/// `Some(&Value::Null)`.
pub fn resolve<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Resolves a dotted path, treating anything missing as `null`.
pub fn resolve_or_null<'a>(record: &'a Record, path: &str) -> &'a Value {
    resolve(record, path).unwrap_or(&NULL)
}

/// Resolves a dotted path against an arbitrary value.
///
/// Non-object values resolve to `None`.
pub fn resolve_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    resolve(value.as_object()?, path)
}

/// Returns the final segment of a dotted path (`category.name` -> `name`).
pub fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
