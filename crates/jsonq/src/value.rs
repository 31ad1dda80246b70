//! Record values and the comparison rules between them.
//!
//! Records are decoded JSON objects, so a field value is a [`serde_json::Value`]:
//! a closed sum over null, booleans, numbers, strings, arrays and objects.
//! This module decides when two such values are equal and how they order.
//!
//! Comparison is strict. Values of different JSON types are never equal and
//! never ordered relative to each other, with one exception: integers and
//! floats are both JSON numbers and compare numerically.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

pub use serde_json::Value;

/// A single decoded record: field name to value, in source order.
pub type Record = serde_json::Map<String, Value>;

/// Numeric view of a JSON number.
///
/// Numbers are kept in one of three variants to preserve precision:
/// - `I64` for signed integers
/// - `U64` for unsigned integers beyond `i64::MAX`
/// - `F64` for floating point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Reads a decoded JSON number.
    pub fn from_json(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            Number::I64(i)
        } else if let Some(u) = n.as_u64() {
            Number::U64(u)
        } else {
            Number::F64(n.as_f64().unwrap_or(f64::NAN))
        }
    }

    /// Reads a value as a number, if it is one.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Number::from_json(n)),
            _ => None,
        }
    }

    /// Converts the number to f64.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers, handling mixed representations.
    ///
    /// Returns `None` only when a NaN is involved.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::I64(a), Number::U64(b)) => Some(match u64::try_from(a) {
                Ok(a) => a.cmp(&b),
                Err(_) => Ordering::Less,
            }),
            (Number::U64(a), Number::I64(b)) => Some(match u64::try_from(b) {
                Ok(b) => a.cmp(&b),
                Err(_) => Ordering::Greater,
            }),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    /// Like [`Number::compare`], but total: NaN sorts after every other number.
    pub fn total_cmp(self, other: Number) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.to_f64().total_cmp(&other.to_f64()))
    }

    /// Adds two numbers. Integer sums stay integers until they overflow.
    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => a
                .checked_add(b)
                .map_or(Number::F64(a as f64 + b as f64), Number::I64),
            (Number::U64(a), Number::U64(b)) => a
                .checked_add(b)
                .map_or(Number::F64(a as f64 + b as f64), Number::U64),
            _ => Number::F64(self.to_f64() + other.to_f64()),
        }
    }

    /// Converts back into a JSON value. Non-finite floats become `null`.
    pub fn into_value(self) -> Value {
        match self {
            Number::I64(n) => Value::from(n),
            Number::U64(n) => Value::from(n),
            Number::F64(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

/// Returns the JSON type name of a value, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strict, type-sensitive equality.
///
/// Values of different JSON types are never equal (`"1"` is not `1`).
/// Numbers compare numerically, so `40` equals `40.0`. Arrays and objects
/// compare element-wise under the same rules.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            Number::from_json(a).compare(Number::from_json(b)) == Some(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| strict_eq(x, y)))
        }
        _ => false,
    }
}

/// Strict ordering between two scalar values of the same type.
///
/// Defined for boolean, number and string pairs only. Returns `None` for
/// mixed types, nulls, arrays, objects and NaN.
pub fn compare_strict(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => Number::from_json(a).compare(Number::from_json(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ============================================================================
// Strict deduplication
// ============================================================================

/// Distinct values under [`strict_eq`], in first-seen order.
///
/// Values are bucketed by a hash that agrees with [`strict_eq`] (numbers hash
/// by numeric value, arrays and objects share one bucket), so lookups stay
/// near constant time for scalar keys.
#[derive(Debug)]
pub(crate) struct StrictKeys<V> {
    keys: Vec<V>,
    buckets: HashMap<u64, Vec<usize>>,
}

impl<V> Default for StrictKeys<V> {
    fn default() -> Self {
        StrictKeys {
            keys: Vec::new(),
            buckets: HashMap::new(),
        }
    }
}

impl<V: Borrow<Value>> StrictKeys<V> {
    /// Returns the slot of `value` and whether it was newly added.
    pub(crate) fn insert(&mut self, value: V) -> (usize, bool) {
        let needle: &Value = value.borrow();
        let bucket = self.buckets.entry(bucket_hash(needle)).or_default();
        let keys = &self.keys;
        if let Some(&slot) = bucket
            .iter()
            .find(|&&slot| strict_eq(keys[slot].borrow(), needle))
        {
            return (slot, false);
        }
        let slot = self.keys.len();
        bucket.push(slot);
        self.keys.push(value);
        (slot, true)
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn into_keys(self) -> Vec<V> {
        self.keys
    }
}

fn bucket_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    match value {
        Value::Null => 0u8.hash(&mut hasher),
        Value::Bool(b) => (1u8, b).hash(&mut hasher),
        Value::Number(n) => {
            let f = Number::from_json(n).to_f64();
            // -0.0 and 0.0 are equal.
            let bits = if f == 0.0 { 0 } else { f.to_bits() };
            (2u8, bits).hash(&mut hasher);
        }
        Value::String(s) => (3u8, s).hash(&mut hasher),
        Value::Array(_) | Value::Object(_) => 4u8.hash(&mut hasher),
    }
    hasher.finish()
}
