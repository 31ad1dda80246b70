//! Query execution.
//!
//! [`QueryExecutor`] runs a [`QuerySpec`] over a record set. Stages always
//! run in the same order, whatever order they were registered in:
//!
//! ```text
//! select -> where* -> distinct -> search -> like -> filter
//!        -> group_by -> having -> skip -> sort -> transform -> limit
//! ```
//!
//! Every stage before `group_by` works on records. Once grouped, `skip` and
//! `limit` count groups, `sort` orders the members of each group and
//! `transform` maps each member.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::debug;

use crate::condition::compare_with;
use crate::error::Result;
use crate::ordering::OrderBy;
use crate::path;
use crate::spec::{HavingCondition, QuerySpec, TextMatch, TransformFn};
use crate::value::{Record, StrictKeys, Value};

/// One group of a grouped result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// The group key: the resolved value of the `group_by` path.
    pub key: Value,
    /// Member records (or their transformed replacements), in input order.
    pub members: Vec<Value>,
}

/// The result of running a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// Ungrouped result: records, or transformed values.
    Records(Vec<Value>),
    /// Grouped result, in first-seen key order.
    Groups(Vec<Group>),
}

impl QueryOutput {
    /// Number of records, or number of groups.
    pub fn len(&self) -> usize {
        match self {
            QueryOutput::Records(records) => records.len(),
            QueryOutput::Groups(groups) => groups.len(),
        }
    }

    /// Returns `true` if there are no records or groups.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens into a dense sequence. Each group becomes an array of its members.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            QueryOutput::Records(records) => records,
            QueryOutput::Groups(groups) => groups
                .into_iter()
                .map(|group| Value::Array(group.members))
                .collect(),
        }
    }

    /// Returns the groups, or `None` for an ungrouped result.
    pub fn into_groups(self) -> Option<Vec<Group>> {
        match self {
            QueryOutput::Records(_) => None,
            QueryOutput::Groups(groups) => Some(groups),
        }
    }
}

/// Applies a [`QuerySpec`] to a record set.
///
/// # Example
///
/// ```
/// use jsonq::{QueryExecutor, QuerySpec, Record};
/// use serde_json::json;
///
/// let records: Vec<Record> = serde_json::from_value(json!([
///     {"id": 1, "price": 40},
///     {"id": 2, "price": 60},
///     {"id": 3, "price": 20},
/// ])).unwrap();
///
/// let spec = QuerySpec::new().and_where("price", ">", 30).sort_desc("price");
/// let output = QueryExecutor::new(&spec).run(records).unwrap();
///
/// let ids: Vec<_> = output.into_values().iter().map(|r| r["id"].clone()).collect();
/// assert_eq!(ids, [json!(2), json!(1)]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor<'q> {
    spec: &'q QuerySpec,
    limit: Option<usize>,
}

impl<'q> QueryExecutor<'q> {
    /// Creates an executor for a spec.
    pub fn new(spec: &'q QuerySpec) -> Self {
        QueryExecutor { spec, limit: None }
    }

    /// Caps the result at `n` entries on top of the `QuerySpec` limit.
    pub fn with_limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn effective_limit(&self) -> Option<usize> {
        match (self.limit, self.spec.get_limit()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Runs every registered stage over `records`.
    ///
    /// Fails only if a `like` pattern cannot be compiled.
    pub fn run(&self, mut records: Vec<Record>) -> Result<QueryOutput> {
        let spec = self.spec;
        let likes = compile_likes(spec.likes())?;
        debug!(records = records.len(), "running query");

        if let Some(fields) = spec.get_select() {
            records = records
                .into_iter()
                .map(|record| project(record, fields))
                .collect();
            debug!(stage = "select", fields = fields.len());
        }

        if !spec.predicates().is_empty() {
            records.retain(|record| spec.predicates().iter().all(|p| p.matches(record)));
            debug!(stage = "where", remaining = records.len());
        }

        if let Some(field) = spec.get_distinct() {
            records = distinct(&records, field);
            debug!(stage = "distinct", field, remaining = records.len());
        }

        for search in spec.searches() {
            let needle = search.pattern.to_lowercase();
            records.retain(|record| {
                text_matches(record, &search.field, |s| s.to_lowercase().contains(&needle))
            });
            debug!(stage = "search", field = %search.field, remaining = records.len());
        }

        for (field, regex) in &likes {
            records.retain(|record| text_matches(record, field, |s| regex.is_match(s)));
            debug!(stage = "like", field = %field, remaining = records.len());
        }

        if let Some(filter) = spec.get_filter() {
            records.retain(|record| filter(record));
            debug!(stage = "filter", remaining = records.len());
        }

        let output = match spec.get_group_by() {
            Some(field) => {
                let groups = group(records, field);
                debug!(stage = "group_by", field, groups = groups.len());
                QueryOutput::Groups(self.finish_groups(groups))
            }
            None => {
                if !spec.having_conditions().is_empty() {
                    debug!("having conditions ignored without group_by");
                }
                QueryOutput::Records(self.finish_records(records))
            }
        };

        debug!(results = output.len(), "query complete");
        Ok(output)
    }

    fn finish_records(&self, mut records: Vec<Record>) -> Vec<Value> {
        let spec = self.spec;
        if let Some(n) = spec.get_skip() {
            skip(&mut records, n);
        }
        if let Some(order) = spec.get_sort() {
            sort(&mut records, order);
        }
        let mut values = apply_transform(records, spec.get_transform());
        if let Some(n) = self.effective_limit() {
            values.truncate(n);
        }
        values
    }

    fn finish_groups(&self, mut groups: Vec<(Value, Vec<Record>)>) -> Vec<Group> {
        let spec = self.spec;
        let having = spec.having_conditions();
        if !having.is_empty() {
            groups.retain(|(_, members)| having_passes(members, having));
            debug!(stage = "having", groups = groups.len());
        }
        if let Some(n) = spec.get_skip() {
            skip(&mut groups, n);
        }
        if let Some(order) = spec.get_sort() {
            for (_, members) in &mut groups {
                sort(members, order);
            }
        }
        let mut groups: Vec<Group> = groups
            .into_iter()
            .map(|(key, members)| Group {
                key,
                members: apply_transform(members, spec.get_transform()),
            })
            .collect();
        if let Some(n) = self.effective_limit() {
            groups.truncate(n);
        }
        groups
    }
}

fn project(mut record: Record, fields: &[String]) -> Record {
    record.retain(|key, _| fields.iter().any(|f| f == key));
    record
}

fn distinct(records: &[Record], field: &str) -> Vec<Record> {
    let key = path::last_segment(field);
    let mut seen = StrictKeys::default();
    for record in records {
        if let Some(value) = path::resolve(record, field).filter(|v| !v.is_null()) {
            seen.insert(value);
        }
    }
    seen.into_keys()
        .into_iter()
        .map(|value| {
            let mut record = Record::new();
            record.insert(key.to_string(), value.clone());
            record
        })
        .collect()
}

/// Matches a string field, or any string element of an array field.
fn text_matches(record: &Record, field: &str, matcher: impl Fn(&str) -> bool) -> bool {
    match path::resolve(record, field) {
        Some(Value::String(s)) => matcher(s.as_str()),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).any(matcher),
        _ => false,
    }
}

fn compile_likes(likes: &[TextMatch]) -> Result<Vec<(&str, Regex)>> {
    let mut compiled = Vec::with_capacity(likes.len());
    for like in likes {
        compiled.push((like.field.as_str(), like_regex(&like.pattern)?));
    }
    Ok(compiled)
}

/// Translates a `%` wildcard pattern into an anchored, case-insensitive regex.
fn like_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let body = pattern
        .split('%')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&format!("^{body}$"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

fn group(records: Vec<Record>, field: &str) -> Vec<(Value, Vec<Record>)> {
    let mut keys = StrictKeys::default();
    let mut members: Vec<Vec<Record>> = Vec::new();
    for record in records {
        let Some(key) = path::resolve(&record, field)
            .filter(|v| !v.is_null())
            .cloned()
        else {
            continue;
        };
        let (slot, new) = keys.insert(key);
        if new {
            members.push(Vec::new());
        }
        members[slot].push(record);
    }
    keys.into_keys().into_iter().zip(members).collect()
}

fn having_passes(members: &[Record], conditions: &[HavingCondition]) -> bool {
    conditions.iter().all(|condition| {
        let aggregated = condition
            .aggregate
            .apply(members, condition.field.as_deref());
        compare_with(&aggregated, condition.op, &condition.value)
    })
}

fn skip<T>(entries: &mut Vec<T>, n: usize) {
    let n = n.min(entries.len());
    entries.drain(..n);
}

fn sort(records: &mut [Record], order: &OrderBy) {
    records.sort_by(|a, b| order.compare(a, b));
}

fn apply_transform(records: Vec<Record>, transform: Option<&TransformFn>) -> Vec<Value> {
    match transform {
        Some(mapping) => records.into_iter().map(|record| mapping(record)).collect(),
        None => records.into_iter().map(Value::Object).collect(),
    }
}
