//! The fluent query builder.
//!
//! [`QueryBuilder`] owns a [`DataSource`], the bound resource and a
//! [`QuerySpec`]. Chain methods only record stages. Every terminal method
//! fetches the resource once and runs the whole pipeline; nothing is cached
//! between terminal calls except the record kept by [`QueryBuilder::first`].
//!
//! # Example
//!
//! ```
//! use jsonq::{Aggregate, MemorySource, QueryBuilder};
//! use serde_json::json;
//!
//! let source = MemorySource::new().with_json("products", r#"[
//!     {"id": 1, "price": 40, "category": {"name": "Shoes"}},
//!     {"id": 2, "price": 60, "category": {"name": "Shoes"}},
//!     {"id": 3, "price": 20, "category": {"name": "Hats"}}
//! ]"#);
//!
//! let mut query = QueryBuilder::new(source);
//! query.from("products").and_where("price", ">", 30);
//! assert_eq!(query.pluck("id")?, [json!(1), json!(2)]);
//!
//! query.reset();
//! assert_eq!(query.aggregate("price", Aggregate::Avg)?, json!(40.0));
//! # Ok::<(), jsonq::QueryError>(())
//! ```

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::aggregate::Aggregate;
use crate::error::{QueryError, Result};
use crate::executor::{Group, QueryExecutor, QueryOutput};
use crate::op::Op;
use crate::ordering::Dir;
use crate::paginate::Page;
use crate::path;
use crate::source::DataSource;
use crate::spec::QuerySpec;
use crate::time::{self, Pick};
use crate::value::{Record, Value};

/// A deferred query over one resource of a [`DataSource`].
#[derive(Debug)]
pub struct QueryBuilder<S> {
    source: S,
    resource: Option<String>,
    spec: QuerySpec,
    first: Option<Value>,
}

impl<S: DataSource> QueryBuilder<S> {
    /// Creates a builder with an empty spec and no bound resource.
    pub fn new(source: S) -> Self {
        QueryBuilder {
            source,
            resource: None,
            spec: QuerySpec::new(),
            first: None,
        }
    }

    /// Returns the accumulated spec.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Returns the bound resource, if any.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns the data source.
    pub fn source(&self) -> &S {
        &self.source
    }

    fn update(&mut self, stage: impl FnOnce(QuerySpec) -> QuerySpec) -> &mut Self {
        let spec = std::mem::take(&mut self.spec);
        self.spec = stage(spec);
        self
    }

    // ========================================================================
    // Chain methods
    // ========================================================================

    /// Binds the resource identifier passed to the data source.
    pub fn from(&mut self, resource: impl Into<String>) -> &mut Self {
        self.resource = Some(resource.into());
        self
    }

    /// See [`QuerySpec::select`].
    pub fn select<I, T>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.update(|spec| spec.select(fields))
    }

    /// Adds a condition with an operator symbol such as `">"` or `"!="`.
    pub fn and_where(&mut self, field: &str, operator: &str, value: impl Into<Value>) -> &mut Self {
        self.update(|spec| spec.and_where(field, operator, value))
    }

    /// Adds a condition with a typed operator.
    pub fn where_op(&mut self, field: &str, op: Op, value: impl Into<Value>) -> &mut Self {
        self.update(|spec| spec.where_op(field, op, value))
    }

    /// Adds an equality condition.
    pub fn find(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.update(|spec| spec.find(field, value))
    }

    /// See [`QuerySpec::where_in`].
    pub fn where_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.update(|spec| spec.where_in(field, values))
    }

    /// See [`QuerySpec::where_not_in`].
    pub fn where_not_in<I, V>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.update(|spec| spec.where_not_in(field, values))
    }

    /// See [`QuerySpec::where_between`].
    pub fn where_between(
        &mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.update(|spec| spec.where_between(field, low, high))
    }

    /// See [`QuerySpec::where_not_between`].
    pub fn where_not_between(
        &mut self,
        field: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.update(|spec| spec.where_not_between(field, low, high))
    }

    /// See [`QuerySpec::search`].
    pub fn search(&mut self, field: &str, text: &str) -> &mut Self {
        self.update(|spec| spec.search(field, text))
    }

    /// See [`QuerySpec::like`].
    pub fn like(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.update(|spec| spec.like(field, pattern))
    }

    /// See [`QuerySpec::filter`].
    pub fn filter<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        self.update(|spec| spec.filter(predicate))
    }

    /// See [`QuerySpec::group_by`].
    pub fn group_by(&mut self, field: &str) -> &mut Self {
        self.update(|spec| spec.group_by(field))
    }

    /// See [`QuerySpec::distinct`].
    pub fn distinct(&mut self, field: &str) -> &mut Self {
        self.update(|spec| spec.distinct(field))
    }

    /// See [`QuerySpec::having`].
    pub fn having(
        &mut self,
        aggregate: Aggregate,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.update(|spec| spec.having(aggregate, operator, value))
    }

    /// See [`QuerySpec::having_on`].
    pub fn having_on(
        &mut self,
        aggregate: Aggregate,
        field: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.update(|spec| spec.having_on(aggregate, field, operator, value))
    }

    /// Drops the first `n` entries.
    pub fn skip(&mut self, n: usize) -> &mut Self {
        self.update(|spec| spec.skip(n))
    }

    /// Keeps at most `n` entries.
    pub fn limit(&mut self, n: usize) -> &mut Self {
        self.update(|spec| spec.limit(n))
    }

    /// Sorts by a dotted field path.
    pub fn sort(&mut self, field: &str, dir: Dir) -> &mut Self {
        self.update(|spec| spec.sort(field, dir))
    }

    /// Sorts descending by a field.
    pub fn sort_desc(&mut self, field: &str) -> &mut Self {
        self.update(|spec| spec.sort_desc(field))
    }

    /// See [`QuerySpec::transform`].
    pub fn transform<F>(&mut self, mapping: F) -> &mut Self
    where
        F: Fn(Record) -> Value + 'static,
    {
        self.update(|spec| spec.transform(mapping))
    }

    /// Clears every registered stage and the record kept by `first`.
    ///
    /// The source and the bound resource are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.spec = QuerySpec::new();
        self.first = None;
        self
    }

    /// Calls `f` with the builder, then returns the builder for further chaining.
    pub fn tap(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        f(self);
        self
    }

    // ========================================================================
    // Terminals
    // ========================================================================

    fn load(&self) -> Result<Vec<Record>> {
        let resource = self.resource.as_deref().ok_or(QueryError::MissingResource)?;
        let records = self.source.fetch(resource)?;
        debug!(resource, records = records.len(), "loaded");
        Ok(records)
    }

    /// Fetches and runs the pipeline, keeping grouped output intact.
    pub fn run(&self) -> Result<QueryOutput> {
        QueryExecutor::new(&self.spec).run(self.load()?)
    }

    /// Fetches and runs the pipeline.
    ///
    /// A grouped query yields one array of members per group.
    pub fn get(&self) -> Result<Vec<Value>> {
        Ok(self.run()?.into_values())
    }

    /// Fetches and runs a grouped query, keeping the group keys.
    pub fn get_groups(&self) -> Result<Vec<Group>> {
        self.run()?.into_groups().ok_or(QueryError::NotGrouped)
    }

    /// Number of results, or of groups for a grouped query.
    pub fn count(&self) -> Result<usize> {
        Ok(self.run()?.len())
    }

    /// Returns `true` if the query has any result.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Returns `true` if the query has no result.
    pub fn not_exists(&self) -> Result<bool> {
        Ok(!self.exists()?)
    }

    /// Runs the pipeline capped at one result and returns it.
    ///
    /// The result is kept for [`QueryBuilder::value`]. The `QuerySpec` limit
    /// is left untouched.
    pub fn first(&mut self) -> Result<Option<Value>> {
        let output = QueryExecutor::new(&self.spec)
            .with_limit(1)
            .run(self.load()?)?;
        let first = output.into_values().into_iter().next();
        self.first = first.clone();
        Ok(first)
    }

    /// Reads a dotted field from the record kept by the last `first` call.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.first
            .as_ref()
            .and_then(|record| path::resolve_value(record, field))
    }

    /// Reduces `field` across the results.
    pub fn aggregate(&self, field: &str, aggregate: Aggregate) -> Result<Value> {
        let entries = self.get()?;
        Ok(aggregate.over_values(
            entries
                .iter()
                .filter_map(|entry| path::resolve_value(entry, field)),
        ))
    }

    /// Collects `field` from every result that has it.
    pub fn pluck(&self, field: &str) -> Result<Vec<Value>> {
        Ok(self
            .get()?
            .iter()
            .filter_map(|entry| path::resolve_value(entry, field))
            .cloned()
            .collect())
    }

    /// Returns page `page` (1-based) of `per_page` results.
    pub fn paginate(&self, page: usize, per_page: usize) -> Result<Page> {
        Ok(Page::slice(self.get()?, page, per_page))
    }

    /// Union of the keys of every object result, in first-seen order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = Vec::new();
        for entry in self.get()? {
            if let Value::Object(record) = entry {
                for key in record.keys() {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }
        Ok(keys)
    }

    /// Returns the last result.
    pub fn latest(&self) -> Result<Option<Value>> {
        Ok(self.get()?.pop())
    }

    /// Returns the result with the most recent timestamp in `field`.
    pub fn newest(&self, field: &str) -> Result<Option<Value>> {
        time::pick(self.get()?, field, Pick::Newest)
    }

    /// Returns the result with the earliest timestamp in `field`.
    pub fn oldest(&self, field: &str) -> Result<Option<Value>> {
        time::pick(self.get()?, field, Pick::Oldest)
    }

    /// Returns one result chosen uniformly at random.
    pub fn random_first(&self) -> Result<Option<Value>> {
        self.random_first_with(&mut rand::thread_rng())
    }

    /// Like [`QueryBuilder::random_first`] with a caller-supplied RNG.
    pub fn random_first_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Option<Value>> {
        Ok(self.get()?.choose(rng).cloned())
    }

    /// Returns the results in a uniformly shuffled order.
    pub fn random_get(&self) -> Result<Vec<Value>> {
        self.random_get_with(&mut rand::thread_rng())
    }

    /// Like [`QueryBuilder::random_get`] with a caller-supplied RNG.
    pub fn random_get_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Value>> {
        let mut entries = self.get()?;
        entries.shuffle(rng);
        Ok(entries)
    }

    /// Serializes the results of [`QueryBuilder::get`] as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.get()?).map_err(QueryError::Serialize)
    }

    /// Serializes the results of [`QueryBuilder::get`] as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.get()?).map_err(QueryError::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn products() -> QueryBuilder<MemorySource> {
        let source = MemorySource::new().with_document(
            "products",
            json!([
                {"id": 1, "price": 40, "category": {"name": "Shoes"}, "created": "2024-02-01"},
                {"id": 2, "price": 60, "category": {"name": "Shoes"}, "created": "2024-03-01"},
                {"id": 3, "price": 20, "category": {"name": "Hats"}, "created": "2024-01-01", "sale": true},
            ]),
        );
        let mut query = QueryBuilder::new(source);
        query.from("products");
        query
    }

    fn ids(entries: &[Value]) -> Vec<Value> {
        entries.iter().map(|e| e["id"].clone()).collect()
    }

    #[test]
    fn terminal_before_from_fails() {
        let query = QueryBuilder::new(MemorySource::new());
        assert!(matches!(query.get(), Err(QueryError::MissingResource)));
    }

    #[test]
    fn chain_methods_accumulate() {
        let mut query = products();
        query.and_where("price", ">", 30).sort_desc("price");
        assert_eq!(ids(&query.get().unwrap()), [json!(2), json!(1)]);
        assert_eq!(query.count().unwrap(), 2);
        assert!(query.exists().unwrap());
    }

    #[test]
    fn reset_keeps_resource() {
        let mut query = products();
        query.find("id", 99);
        assert!(query.not_exists().unwrap());
        query.reset();
        assert!(query.spec().is_empty());
        assert_eq!(query.resource(), Some("products"));
        assert_eq!(query.count().unwrap(), 3);
    }

    #[test]
    fn first_caches_record_for_value() {
        let mut query = products();
        query.sort_desc("price").limit(5);
        let first = query.first().unwrap().unwrap();
        assert_eq!(first["id"], json!(2));
        assert_eq!(query.value("category.name"), Some(&json!("Shoes")));
        assert_eq!(query.value("missing"), None);
        assert_eq!(query.spec().get_limit(), Some(5));

        query.reset();
        assert_eq!(query.value("id"), None);
    }

    #[test]
    fn first_on_empty_result_is_none() {
        let mut query = products();
        query.and_where("price", ">", 1000);
        assert_eq!(query.first().unwrap(), None);
        assert_eq!(query.value("id"), None);
    }

    #[test]
    fn aggregates_over_results() {
        let mut query = products();
        assert_eq!(query.aggregate("price", Aggregate::Avg).unwrap(), json!(40.0));
        assert_eq!(query.aggregate("price", Aggregate::Sum).unwrap(), json!(120));
        assert_eq!(query.aggregate("price", Aggregate::Max).unwrap(), json!(60));
        query.and_where("price", ">", 1000);
        assert_eq!(query.aggregate("price", Aggregate::Avg).unwrap(), Value::Null);
    }

    #[test]
    fn pluck_skips_absent_fields() {
        let query = products();
        assert_eq!(query.pluck("sale").unwrap(), [json!(true)]);
        assert_eq!(
            query.pluck("category.name").unwrap(),
            [json!("Shoes"), json!("Shoes"), json!("Hats")]
        );
    }

    #[test]
    fn keys_union_in_first_seen_order() {
        let query = products();
        assert_eq!(
            query.keys().unwrap(),
            ["id", "price", "category", "created", "sale"]
        );
    }

    #[test]
    fn latest_newest_oldest() {
        let query = products();
        assert_eq!(query.latest().unwrap().unwrap()["id"], json!(3));
        assert_eq!(query.newest("created").unwrap().unwrap()["id"], json!(2));
        assert_eq!(query.oldest("created").unwrap().unwrap()["id"], json!(3));
        assert!(matches!(
            query.newest("sale"),
            Err(QueryError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn grouped_terminals() {
        let mut query = products();
        assert!(matches!(query.get_groups(), Err(QueryError::NotGrouped)));

        query.group_by("category.name");
        assert_eq!(query.count().unwrap(), 2);
        let groups = query.get_groups().unwrap();
        assert_eq!(groups[1].key, json!("Hats"));
        let values = query.get().unwrap();
        assert_eq!(values[0].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn random_with_seeded_rng_is_a_permutation() {
        let query = products();
        let mut rng = StdRng::seed_from_u64(7);
        let mut shuffled = ids(&query.random_get_with(&mut rng).unwrap());
        shuffled.sort_by_key(|v| v.as_i64());
        assert_eq!(shuffled, [json!(1), json!(2), json!(3)]);

        let picked = query.random_first_with(&mut rng).unwrap().unwrap();
        assert!(query.get().unwrap().contains(&picked));
    }

    #[test]
    fn to_json_round_trips() {
        let mut query = products();
        query.select(["id", "price"]).limit(2);
        let text = query.to_json().unwrap();
        let decoded: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, query.get().unwrap());
        assert_eq!(text, r#"[{"id":1,"price":40},{"id":2,"price":60}]"#);
    }

    #[test]
    fn tap_sees_builder_state() {
        let mut query = products();
        let mut seen = 0;
        query
            .and_where("price", ">", 30)
            .tap(|q| seen = q.spec().predicates().len())
            .limit(1);
        assert_eq!(seen, 1);
        assert_eq!(query.count().unwrap(), 1);
    }

    #[test]
    fn tap_can_register_stages() {
        let mut query = products();
        query.tap(|q| {
            q.limit(2);
        });
        assert_eq!(query.count().unwrap(), 2);
    }
}
