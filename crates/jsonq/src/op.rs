//! Comparison operators for `where` and `having` conditions.

use std::cmp::Ordering;
use std::str::FromStr;

/// Comparison operator for a condition.
///
/// `Eq` and `Ne` apply to every value type. The ordering operators apply to
/// pairs of booleans, numbers or strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Equal (strict).
    Eq,
    /// Not equal (strict).
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
}

impl Op {
    /// Parses an operator symbol.
    ///
    /// Accepts `=`, `==`, `===`, `!=`, `!==`, `<>`, `>`, `>=`, `<`, `<=`.
    pub fn parse(symbol: &str) -> Option<Op> {
        match symbol.trim() {
            "=" | "==" | "===" => Some(Op::Eq),
            "!=" | "!==" | "<>" => Some(Op::Ne),
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Gte),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Lte),
            _ => None,
        }
    }

    /// Evaluates this operator given an ordering between field and operand.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
        }
    }

    /// Returns the canonical symbol of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unsupported operator symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Op {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::parse(s).ok_or_else(|| UnknownOperator(s.to_string()))
    }
}
