//! Parsing of the small expression syntax accepted by query flags.
//!
//! - `--where 'price>=30'`: field, operator, JSON value
//! - `--in 'id=1,2,3'`, `--search 'title=shoe'`: field, then text
//! - `--having 'count>2'`, `--having 'avg:price<50'`: aggregate, optional field
//! - `--sort price:desc`, `--aggregate price:avg`

use anyhow::{anyhow, bail, Context, Result};
use jsonq::{Aggregate, Dir, Value};

const OPERATOR_CHARS: &[char] = &['=', '!', '<', '>'];

/// A `field <op> value` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

/// A `having` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct HavingExpr {
    pub aggregate: Aggregate,
    pub field: Option<String>,
    pub operator: String,
    pub value: Value,
}

/// Reads a literal as JSON, falling back to a plain string.
///
/// `30` is a number, `"30"` and `shoe` are strings, `null` is null.
pub fn literal(text: &str) -> Value {
    let text = text.trim();
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Splits `price>=30` into field, operator and value.
pub fn comparison(expr: &str) -> Result<Comparison> {
    let start = expr
        .find(OPERATOR_CHARS)
        .ok_or_else(|| anyhow!("no operator in '{expr}'"))?;
    let rest = &expr[start..];
    let len = rest
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .unwrap_or(rest.len());

    let field = expr[..start].trim();
    if field.is_empty() {
        bail!("missing field in '{expr}'");
    }
    Ok(Comparison {
        field: field.to_string(),
        operator: rest[..len].to_string(),
        value: literal(&rest[len..]),
    })
}

/// Splits `field=text` at the first `=`.
pub fn field_text(expr: &str) -> Result<(String, String)> {
    let (field, text) = expr
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=TEXT, got '{expr}'"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("missing field in '{expr}'");
    }
    Ok((field.to_string(), text.to_string()))
}

/// Splits `field=a,b,c` into a field and its literal values.
pub fn field_values(expr: &str) -> Result<(String, Vec<Value>)> {
    let (field, list) = field_text(expr)?;
    Ok((field, list.split(',').map(literal).collect()))
}

/// Parses `count>2` or `sum:price>=100`.
pub fn having(expr: &str) -> Result<HavingExpr> {
    let parsed = comparison(expr)?;
    let (name, field) = match parsed.field.split_once(':') {
        Some((name, field)) => (name, Some(field.trim().to_string())),
        None => (parsed.field.as_str(), None),
    };
    let aggregate: Aggregate = name.trim().parse()?;
    if field.is_none() && aggregate.reads_field() {
        bail!("'{aggregate}' needs a field, e.g. '{aggregate}:price>10'");
    }
    Ok(HavingExpr {
        aggregate,
        field,
        operator: parsed.operator,
        value: parsed.value,
    })
}

/// Parses `field` or `field:asc|desc`.
pub fn sort_key(expr: &str) -> Result<(String, Dir)> {
    match expr.rsplit_once(':') {
        Some((field, dir)) => {
            let dir: Dir = dir
                .parse()
                .with_context(|| format!("invalid sort '{expr}'"))?;
            Ok((field.to_string(), dir))
        }
        None => Ok((expr.to_string(), Dir::Asc)),
    }
}

/// Parses `field:aggregate`.
pub fn aggregate(expr: &str) -> Result<(String, Aggregate)> {
    let (field, name) = expr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected FIELD:FUNCTION, got '{expr}'"))?;
    let aggregate: Aggregate = name
        .parse()
        .with_context(|| format!("invalid aggregate '{expr}'"))?;
    Ok((field.to_string(), aggregate))
}
