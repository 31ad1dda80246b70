//! Aggregate functions over a field of a record set.
//!
//! The same [`Aggregate`] kinds serve the `aggregate` terminal and the
//! per-group `having` conditions.

use std::str::FromStr;

use crate::ordering::compare_values;
use crate::path;
use crate::value::{Number, Record, StrictKeys, Value};

/// An aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// Number of present, non-null values (or records, with no field).
    Count,
    /// Sum of numeric values.
    Sum,
    /// Arithmetic mean of numeric values.
    Avg,
    /// Largest present value in natural order.
    Max,
    /// Smallest present value in natural order.
    Min,
    /// Number of strictly distinct present values.
    DistinctCount,
    /// Whether any value is present (or any record, with no field).
    Exists,
}

impl Aggregate {
    /// Returns the name of this aggregate.
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::DistinctCount => "distinct_count",
            Aggregate::Exists => "exists",
        }
    }

    /// Returns `true` if the aggregate is meaningless without a field.
    ///
    /// Only `count` and `exists` can look at records instead of values.
    pub fn reads_field(self) -> bool {
        !matches!(self, Aggregate::Count | Aggregate::Exists)
    }

    /// Applies this aggregate to a field of each record.
    ///
    /// With `field = None` the aggregate sees no values, except `count` and
    /// `exists`, which then look at the records themselves.
    ///
    /// Empty input yields `0` for `count`, `sum` and `distinct_count`,
    /// `false` for `exists`, and `null` for `avg`, `max` and `min`.
    pub fn apply<'a, I>(self, records: I, field: Option<&str>) -> Value
    where
        I: IntoIterator<Item = &'a Record>,
    {
        match field {
            Some(field) => self.over_values(
                records
                    .into_iter()
                    .filter_map(|record| path::resolve(record, field)),
            ),
            None => match self {
                Aggregate::Count => Value::from(records.into_iter().count()),
                Aggregate::Exists => Value::Bool(records.into_iter().next().is_some()),
                _ => self.over_values(std::iter::empty()),
            },
        }
    }

    /// Applies this aggregate to a sequence of values. Nulls are ignored.
    pub fn over_values<'a, I>(self, values: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let values = values.into_iter().filter(|v| !v.is_null());
        match self {
            Aggregate::Count => Value::from(values.count()),
            Aggregate::Exists => Value::Bool(values.count() > 0),
            Aggregate::Sum => numbers(values)
                .fold(Number::I64(0), Number::add)
                .into_value(),
            Aggregate::Avg => {
                let (sum, count) =
                    numbers(values).fold((Number::I64(0), 0usize), |(sum, count), n| {
                        (sum.add(n), count + 1)
                    });
                if count == 0 {
                    Value::Null
                } else {
                    Number::F64(sum.to_f64() / count as f64).into_value()
                }
            }
            Aggregate::Max => extreme(values, |candidate, best| {
                compare_values(candidate, best).is_gt()
            }),
            Aggregate::Min => extreme(values, |candidate, best| {
                compare_values(candidate, best).is_lt()
            }),
            Aggregate::DistinctCount => {
                let mut seen = StrictKeys::default();
                for value in values {
                    seen.insert(value);
                }
                Value::from(seen.len())
            }
        }
    }
}

fn numbers<'a>(values: impl Iterator<Item = &'a Value>) -> impl Iterator<Item = Number> {
    values.filter_map(Number::from_value)
}

/// Keeps the first value for which no later value is `better`.
fn extreme<'a>(
    values: impl Iterator<Item = &'a Value>,
    better: impl Fn(&Value, &Value) -> bool,
) -> Value {
    let mut best: Option<&Value> = None;
    for value in values {
        match best {
            Some(current) if !better(value, current) => {}
            _ => best = Some(value),
        }
    }
    best.cloned().unwrap_or(Value::Null)
}

impl std::fmt::Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown aggregate name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown aggregate '{0}'")]
pub struct UnknownAggregate(pub String);

impl FromStr for Aggregate {
    type Err = UnknownAggregate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(Aggregate::Count),
            "sum" => Ok(Aggregate::Sum),
            "avg" | "average" => Ok(Aggregate::Avg),
            "max" => Ok(Aggregate::Max),
            "min" => Ok(Aggregate::Min),
            "distinct_count" => Ok(Aggregate::DistinctCount),
            "exists" => Ok(Aggregate::Exists),
            _ => Err(UnknownAggregate(s.to_string())),
        }
    }
}
