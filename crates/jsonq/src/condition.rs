//! Record predicates.
//!
//! A [`Condition`] is a single `(field, operator, value)` triple. A
//! [`Predicate`] is anything registered by the `where*` family: a condition,
//! a set membership test, or a range test. Evaluation is pure and never fails;
//! a missing field reads as `null` and incompatible types simply don't match.

use crate::op::Op;
use crate::path;
use crate::value::{compare_strict, strict_eq, Record, Value};

/// Evaluates one `(field, operator, value)` triple against a record.
///
/// The operator is given as a symbol (`=`, `>`, `!=`, ...). Unknown symbols
/// evaluate to `false`.
///
/// # Example
///
/// ```
/// use jsonq::evaluate;
/// use serde_json::json;
///
/// let record = json!({"price": 40, "category": {"name": "Shoes"}});
/// let record = record.as_object().unwrap();
///
/// assert!(evaluate(record, "price", ">", &json!(30)));
/// assert!(evaluate(record, "category.name", "=", &json!("Shoes")));
/// assert!(!evaluate(record, "price", "=", &json!("40")));
/// assert!(!evaluate(record, "price", "~", &json!(40)));
/// ```
pub fn evaluate(record: &Record, field: &str, operator: &str, value: &Value) -> bool {
    evaluate_op(record, field, Op::parse(operator), value)
}

/// Typed form of [`evaluate`]. `None` stands for an unknown operator.
pub fn evaluate_op(record: &Record, field: &str, op: Option<Op>, value: &Value) -> bool {
    compare_with(path::resolve_or_null(record, field), op, value)
}

/// Compares an already-resolved value against an operand.
pub fn compare_with(actual: &Value, op: Option<Op>, expected: &Value) -> bool {
    match op {
        Some(Op::Eq) => strict_eq(actual, expected),
        Some(Op::Ne) => !strict_eq(actual, expected),
        Some(op) => compare_strict(actual, expected).is_some_and(|ord| op.eval_ordering(ord)),
        None => false,
    }
}

/// A single `(field, operator, value)` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Dotted path of the field to compare.
    pub field: String,
    /// The comparison operator, or `None` if the symbol was not recognised.
    pub op: Option<Op>,
    /// The operand.
    pub value: Value,
}

impl Condition {
    /// Creates a condition with a typed operator.
    pub fn new(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Condition {
            field: field.into(),
            op: Some(op),
            value: value.into(),
        }
    }

    /// Creates a condition from an operator symbol.
    ///
    /// Unknown symbols are kept as `None` and the condition never matches.
    pub fn parse(field: impl Into<String>, operator: &str, value: impl Into<Value>) -> Self {
        Condition {
            field: field.into(),
            op: Op::parse(operator),
            value: value.into(),
        }
    }

    /// Evaluates this condition against a record.
    pub fn matches(&self, record: &Record) -> bool {
        evaluate_op(record, &self.field, self.op, &self.value)
    }
}

/// A predicate registered by one of the `where*` builder methods.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `where(field, op, value)`.
    Compare(Condition),
    /// `where_in(field, values)`: the field strictly equals one of the values.
    In { field: String, values: Vec<Value> },
    /// `where_not_in(field, values)`: the field equals none of the values.
    NotIn { field: String, values: Vec<Value> },
    /// `where_between(field, low, high)`: `low <= field <= high`.
    Between {
        field: String,
        low: Value,
        high: Value,
    },
    /// `where_not_between(field, low, high)`: `field < low || field > high`.
    NotBetween {
        field: String,
        low: Value,
        high: Value,
    },
}

impl Predicate {
    /// Returns the dotted path this predicate reads.
    pub fn field(&self) -> &str {
        match self {
            Predicate::Compare(condition) => &condition.field,
            Predicate::In { field, .. }
            | Predicate::NotIn { field, .. }
            | Predicate::Between { field, .. }
            | Predicate::NotBetween { field, .. } => field,
        }
    }

    /// Evaluates this predicate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Compare(condition) => condition.matches(record),
            Predicate::In { field, values } => {
                let actual = path::resolve_or_null(record, field);
                values.iter().any(|v| strict_eq(actual, v))
            }
            Predicate::NotIn { field, values } => {
                let actual = path::resolve_or_null(record, field);
                !values.iter().any(|v| strict_eq(actual, v))
            }
            Predicate::Between { field, low, high } => {
                let actual = path::resolve_or_null(record, field);
                compare_with(actual, Some(Op::Gte), low) && compare_with(actual, Some(Op::Lte), high)
            }
            // Missing or incomparable values are outside every range and
            // also outside its complement.
            Predicate::NotBetween { field, low, high } => {
                let actual = path::resolve_or_null(record, field);
                compare_with(actual, Some(Op::Lt), low) || compare_with(actual, Some(Op::Gt), high)
            }
        }
    }
}
