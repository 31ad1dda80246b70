//! Sort direction and record ordering.
//!
//! Provides [`Dir`] for sort direction and [`OrderBy`] for field-based ordering.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::path;
use crate::value::{Number, Record, Value};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Applies this direction to an ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    /// Returns the display name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing a direction other than `asc` or `desc`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort direction '{0}', expected 'asc' or 'desc'")]
pub struct UnknownDirection(pub String);

impl FromStr for Dir {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Dir::Asc),
            "desc" => Ok(Dir::Desc),
            _ => Err(UnknownDirection(s.to_string())),
        }
    }
}

/// A sort key: a dotted field path and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    pub dir: Dir,
}

impl OrderBy {
    /// Creates a new ascending ordering for the given field.
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy::new(field, Dir::Asc)
    }

    /// Creates a new descending ordering for the given field.
    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy::new(field, Dir::Desc)
    }

    /// Creates a new ordering with the given direction.
    pub fn new(field: impl Into<String>, dir: Dir) -> Self {
        OrderBy {
            field: field.into(),
            dir,
        }
    }

    /// Compares two records on this ordering's field.
    ///
    /// Records where the field is missing or `null` sort after every other
    /// record regardless of direction.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let a = path::resolve(a, &self.field).filter(|v| !v.is_null());
        let b = path::resolve(b, &self.field).filter(|v| !v.is_null());
        match (a, b) {
            (Some(a), Some(b)) => self.dir.apply(compare_values(a, b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Total natural order over JSON values.
///
/// Values of the same type use their natural order (numbers numerically,
/// strings lexicographically, `false < true`). Mixed types are ranked by type:
/// booleans, numbers, strings, arrays, objects, then null. Arrays and objects
/// are not ordered among themselves.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            Number::from_json(a).total_cmp(Number::from_json(b))
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn dir_apply() {
        assert_eq!(Dir::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Dir::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Dir::Desc.apply(Ordering::Equal), Ordering::Equal);
    }

    #[test]
    fn dir_parse() {
        assert_eq!("asc".parse::<Dir>(), Ok(Dir::Asc));
        assert_eq!("DESC".parse::<Dir>(), Ok(Dir::Desc));
        assert!("up".parse::<Dir>().is_err());
        assert_eq!(Dir::Desc.to_string(), "desc");
    }

    #[test]
    fn compare_same_types() {
        assert_eq!(compare_values(&json!(1), &json!(2.5)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(true), &json!(false)), Ordering::Greater);
        assert_eq!(compare_values(&json!([1]), &json!([2])), Ordering::Equal);
    }

    #[test]
    fn compare_mixed_types_by_rank() {
        assert_eq!(compare_values(&json!(5), &json!("5")), Ordering::Less);
        assert_eq!(compare_values(&json!(null), &json!("x")), Ordering::Greater);
        assert_eq!(compare_values(&json!({}), &json!([])), Ordering::Greater);
    }

    #[test]
    fn missing_sorts_last_in_both_directions() {
        let present = record(json!({"price": 10}));
        let missing = record(json!({"id": 1}));
        let null = record(json!({"price": null}));

        for order in [OrderBy::asc("price"), OrderBy::desc("price")] {
            assert_eq!(order.compare(&present, &missing), Ordering::Less);
            assert_eq!(order.compare(&missing, &present), Ordering::Greater);
            assert_eq!(order.compare(&null, &present), Ordering::Greater);
            assert_eq!(order.compare(&missing, &null), Ordering::Equal);
        }
    }

    #[test]
    fn order_by_direction() {
        let a = record(json!({"meta": {"rank": 1}}));
        let b = record(json!({"meta": {"rank": 2}}));

        assert_eq!(OrderBy::asc("meta.rank").compare(&a, &b), Ordering::Less);
        assert_eq!(OrderBy::desc("meta.rank").compare(&a, &b), Ordering::Greater);
    }
}
