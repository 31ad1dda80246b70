//! The query descriptor.
//!
//! A [`QuerySpec`] records which pipeline stages a query wants, without
//! running anything. It is built with chained calls and read by the
//! [`QueryExecutor`](crate::QueryExecutor), which never mutates it.
//!
//! # Example
//!
//! ```
//! use jsonq::{Aggregate, Dir, QuerySpec};
//!
//! let spec = QuerySpec::new()
//!     .and_where("price", ">", 30)
//!     .where_in("status", ["active", "pending"])
//!     .group_by("category.name")
//!     .having(Aggregate::Count, ">", 2)
//!     .sort("price", Dir::Desc)
//!     .limit(10);
//!
//! assert_eq!(spec.predicates().len(), 2);
//! assert_eq!(spec.get_limit(), Some(10));
//! ```

use std::fmt;

use tracing::warn;

use crate::aggregate::Aggregate;
use crate::condition::{Condition, Predicate};
use crate::op::Op;
use crate::ordering::{Dir, OrderBy};
use crate::value::{Record, Value};

/// Custom record predicate registered with [`QuerySpec::filter`].
pub type FilterFn = Box<dyn Fn(&Record) -> bool>;

/// Record mapping registered with [`QuerySpec::transform`].
pub type TransformFn = Box<dyn Fn(Record) -> Value>;

/// A `(field, text)` pair for the `search` and `like` stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    /// Dotted path of the field to match.
    pub field: String,
    /// The search text or `%` wildcard pattern, as given.
    pub pattern: String,
}

/// A post-aggregation condition applied to each group.
#[derive(Debug, Clone, PartialEq)]
pub struct HavingCondition {
    /// The aggregate computed over the group.
    pub aggregate: Aggregate,
    /// The field the aggregate reads; `None` aggregates the records themselves.
    pub field: Option<String>,
    /// The comparison operator, or `None` if the symbol was not recognised.
    pub op: Option<Op>,
    /// The operand the aggregate is compared against.
    pub value: Value,
}

/// Accumulated description of the stages a query runs.
///
/// Every stage is optional. Multi-entry stages (`where*`, `search`, `like`,
/// `having`) combine their entries with AND. Single-entry stages keep the
/// last registration.
#[derive(Default)]
pub struct QuerySpec {
    select: Option<Vec<String>>,
    predicates: Vec<Predicate>,
    distinct: Option<String>,
    searches: Vec<TextMatch>,
    likes: Vec<TextMatch>,
    filter: Option<FilterFn>,
    group_by: Option<String>,
    having: Vec<HavingCondition>,
    skip: Option<usize>,
    sort: Option<OrderBy>,
    transform: Option<TransformFn>,
    limit: Option<usize>,
}

impl QuerySpec {
    /// Creates a new empty spec. An empty spec returns every record.
    pub fn new() -> Self {
        QuerySpec::default()
    }

    // ========================================================================
    // Projection
    // ========================================================================

    /// Restricts each record to the given top-level keys.
    ///
    /// Replaces any earlier selection. Keys absent from a record are omitted.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !selected.contains(&field) {
                selected.push(field);
            }
        }
        self.select = Some(selected);
        self
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    /// Adds a `(field, operator, value)` condition.
    ///
    /// Unknown operator symbols are accepted but never match.
    pub fn and_where(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let condition = Condition::parse(field, operator, value);
        if condition.op.is_none() {
            warn!(field, operator, "unknown operator; condition will never match");
        }
        self.predicates.push(Predicate::Compare(condition));
        self
    }

    /// Adds a condition with a typed operator.
    pub fn where_op(mut self, field: &str, op: Op, value: impl Into<Value>) -> Self {
        self.predicates
            .push(Predicate::Compare(Condition::new(field, op, value)));
        self
    }

    /// Adds an equality condition. Shorthand for `where_op(field, Op::Eq, value)`.
    pub fn find(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_op(field, Op::Eq, value)
    }

    /// Keeps records whose field strictly equals one of `values`.
    pub fn where_in<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.predicates.push(Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Keeps records whose field equals none of `values`.
    pub fn where_not_in<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.predicates.push(Predicate::NotIn {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Keeps records with `low <= field <= high`.
    pub fn where_between(
        mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.predicates.push(Predicate::Between {
            field: field.to_string(),
            low: low.into(),
            high: high.into(),
        });
        self
    }

    /// Keeps records with `field < low` or `field > high`.
    pub fn where_not_between(
        mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.predicates.push(Predicate::NotBetween {
            field: field.to_string(),
            low: low.into(),
            high: high.into(),
        });
        self
    }

    // ========================================================================
    // Distinct, text matching, custom filter
    // ========================================================================

    /// Replaces the records with one record per distinct value of `field`.
    pub fn distinct(mut self, field: &str) -> Self {
        self.distinct = Some(field.to_string());
        self
    }

    /// Adds a case-insensitive substring search on `field`.
    pub fn search(mut self, field: &str, text: &str) -> Self {
        self.searches.push(TextMatch {
            field: field.to_string(),
            pattern: text.to_string(),
        });
        self
    }

    /// Adds an anchored, case-insensitive pattern match on `field`.
    ///
    /// `%` matches any run of characters; everything else is literal.
    pub fn like(mut self, field: &str, pattern: &str) -> Self {
        self.likes.push(TextMatch {
            field: field.to_string(),
            pattern: pattern.to_string(),
        });
        self
    }

    /// Sets the custom filter predicate. A later call replaces an earlier one.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        if self.filter.is_some() {
            warn!("replacing previously registered filter callback");
        }
        self.filter = Some(Box::new(predicate));
        self
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    /// Groups records by the value at a dotted path.
    pub fn group_by(mut self, field: &str) -> Self {
        self.group_by = Some(field.to_string());
        self
    }

    /// Adds a group condition on an aggregate over the group's records.
    ///
    /// Only `count` and `exists` work on records. Any other aggregate needs a
    /// field: it is rejected with a warning and the spec is left unchanged.
    /// Use [`QuerySpec::having_on`] for those.
    pub fn having(self, aggregate: Aggregate, operator: &str, value: impl Into<Value>) -> Self {
        if aggregate.reads_field() {
            warn!(%aggregate, operator, "aggregate needs a field; having condition ignored, use having_on");
            return self;
        }
        self.push_having(aggregate, None, operator, value.into())
    }

    /// Adds a group condition on an aggregate over one field.
    pub fn having_on(
        self,
        aggregate: Aggregate,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.push_having(aggregate, Some(field.to_string()), operator, value.into())
    }

    fn push_having(
        mut self,
        aggregate: Aggregate,
        field: Option<String>,
        operator: &str,
        value: Value,
    ) -> Self {
        let op = Op::parse(operator);
        if op.is_none() {
            warn!(%aggregate, operator, "unknown operator; having condition will never match");
        }
        self.having.push(HavingCondition {
            aggregate,
            field,
            op,
            value,
        });
        self
    }

    // ========================================================================
    // Ordering, paging, transform
    // ========================================================================

    /// Drops the first `n` entries.
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    /// Keeps at most `n` entries.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Sorts by a dotted field path.
    pub fn sort(mut self, field: &str, dir: Dir) -> Self {
        self.sort = Some(OrderBy::new(field, dir));
        self
    }

    /// Sorts ascending by a field.
    pub fn sort_asc(self, field: &str) -> Self {
        self.sort(field, Dir::Asc)
    }

    /// Sorts descending by a field.
    pub fn sort_desc(self, field: &str) -> Self {
        self.sort(field, Dir::Desc)
    }

    /// Sets the per-record mapping. A later call replaces an earlier one.
    pub fn transform<F>(mut self, mapping: F) -> Self
    where
        F: Fn(Record) -> Value + 'static,
    {
        if self.transform.is_some() {
            warn!("replacing previously registered transform callback");
        }
        self.transform = Some(Box::new(mapping));
        self
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Returns the projected keys, if set.
    pub fn get_select(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Returns the `where*` predicates in registration order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns the distinct field, if set.
    pub fn get_distinct(&self) -> Option<&str> {
        self.distinct.as_deref()
    }

    /// Returns the substring searches.
    pub fn searches(&self) -> &[TextMatch] {
        &self.searches
    }

    /// Returns the wildcard patterns.
    pub fn likes(&self) -> &[TextMatch] {
        &self.likes
    }

    /// Returns the custom filter, if set.
    pub fn get_filter(&self) -> Option<&FilterFn> {
        self.filter.as_ref()
    }

    /// Returns the grouping path, if set.
    pub fn get_group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    /// Returns the having conditions.
    pub fn having_conditions(&self) -> &[HavingCondition] {
        &self.having
    }

    /// Returns the skip count, if set.
    pub fn get_skip(&self) -> Option<usize> {
        self.skip
    }

    /// Returns the sort key, if set.
    pub fn get_sort(&self) -> Option<&OrderBy> {
        self.sort.as_ref()
    }

    /// Returns the transform, if set.
    pub fn get_transform(&self) -> Option<&TransformFn> {
        self.transform.as_ref()
    }

    /// Returns the limit, if set.
    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns `true` if no stage is registered.
    pub fn is_empty(&self) -> bool {
        self.select.is_none()
            && self.predicates.is_empty()
            && self.distinct.is_none()
            && self.searches.is_empty()
            && self.likes.is_empty()
            && self.filter.is_none()
            && self.group_by.is_none()
            && self.having.is_empty()
            && self.skip.is_none()
            && self.sort.is_none()
            && self.transform.is_none()
            && self.limit.is_none()
    }
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("select", &self.select)
            .field("predicates", &self.predicates)
            .field("distinct", &self.distinct)
            .field("searches", &self.searches)
            .field("likes", &self.likes)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("group_by", &self.group_by)
            .field("having", &self.having)
            .field("skip", &self.skip)
            .field("sort", &self.sort)
            .field("transform", &self.transform.as_ref().map(|_| "<fn>"))
            .field("limit", &self.limit)
            .finish()
    }
}
