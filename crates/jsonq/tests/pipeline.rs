//! End-to-end behavior of the query builder against in-memory and file sources.

use jsonq::{
    Aggregate, DataSource, Dir, FileSource, MemorySource, Op, QueryBuilder, QueryError, Record,
    Value,
};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

// ============================================================================
// Fixtures
// ============================================================================

const PRODUCTS: &str = r#"[
    {"id": 1, "title": "Classic Red Shoe", "price": 40, "category": {"name": "Shoes"},
     "tags": ["sale", "leather"], "created_at": "2024-02-10 09:00:00"},
    {"id": 2, "title": "Running Shoe", "price": 60, "category": {"name": "Shoes"},
     "tags": ["new"], "created_at": "2024-03-05 18:30:00"},
    {"id": 3, "title": "Red Hat", "price": 20, "category": {"name": "Hats"},
     "tags": ["sale"], "created_at": "2024-01-20 12:00:00"},
    {"id": 4, "title": "Wool Scarf", "price": 35.5, "category": {"name": "Scarves"},
     "tags": [], "created_at": "2023-12-01 08:15:00"},
    {"id": 5, "title": "Gift Card", "price": null, "created_at": "2024-04-01 00:00:00"}
]"#;

const SAMPLE: &str = r#"[
    {"id": 1, "price": 40, "category": {"name": "Shoes"}},
    {"id": 2, "price": 60, "category": {"name": "Shoes"}},
    {"id": 3, "price": 20, "category": {"name": "Hats"}}
]"#;

fn query() -> QueryBuilder<MemorySource> {
    let source = MemorySource::new()
        .with_json("products", PRODUCTS)
        .with_json("example", SAMPLE);
    let mut query = QueryBuilder::new(source);
    query.from("products");
    query
}

fn example() -> QueryBuilder<MemorySource> {
    let mut q = query();
    q.from("example");
    q
}

fn ids(entries: &[Value]) -> Vec<i64> {
    entries.iter().filter_map(|e| e["id"].as_i64()).collect()
}

// ============================================================================
// Worked examples
// ============================================================================

#[test]
fn where_price_greater_than_30() {
    let mut q = example();
    q.and_where("price", ">", 30);
    assert_eq!(ids(&q.get().unwrap()), [1, 2]);
}

#[test]
fn distinct_category_name() {
    let mut q = example();
    q.distinct("category.name");
    assert_eq!(
        q.get().unwrap(),
        [json!({"name": "Shoes"}), json!({"name": "Hats"})]
    );
}

#[test]
fn average_price() {
    let q = example();
    assert_eq!(q.aggregate("price", Aggregate::Avg).unwrap(), json!(40.0));
}

#[test]
fn paginate_second_page_of_one() {
    let q = example();
    let page = q.paginate(2, 1).unwrap();
    assert_eq!(
        serde_json::to_value(&page).unwrap(),
        json!({
            "data": [{"id": 2, "price": 60, "category": {"name": "Shoes"}}],
            "pagination": {
                "total": 3, "per_page": 1, "current_page": 2,
                "last_page": 3, "from": 2, "to": 2
            }
        })
    );
}

// ============================================================================
// Predicates
// ============================================================================

#[test]
fn comparisons_are_type_strict() {
    let mut q = query();
    q.find("price", "40");
    assert!(q.not_exists().unwrap());

    q.reset();
    q.find("price", 40);
    assert_eq!(ids(&q.get().unwrap()), [1]);

    q.reset();
    q.and_where("price", "<", "100");
    assert!(q.get().unwrap().is_empty());
}

#[test]
fn integer_and_float_compare_numerically() {
    let mut q = query();
    q.and_where("price", ">=", 35.5).and_where("price", "<", 41);
    assert_eq!(ids(&q.get().unwrap()), [1, 4]);
}

#[test]
fn not_equal_includes_missing_fields() {
    let mut q = query();
    q.and_where("category.name", "!=", "Shoes");
    assert_eq!(ids(&q.get().unwrap()), [3, 4, 5]);
}

#[test]
fn null_matches_missing_and_explicit_null() {
    let mut q = query();
    q.find("price", Value::Null);
    assert_eq!(ids(&q.get().unwrap()), [5]);

    q.reset();
    q.find("category.name", Value::Null);
    assert_eq!(ids(&q.get().unwrap()), [5]);
}

#[test]
fn unknown_operator_matches_nothing() {
    let mut q = query();
    q.and_where("price", "=~", 40);
    assert_eq!(q.count().unwrap(), 0);
}

#[test]
fn operator_aliases() {
    let mut q = query();
    q.and_where("id", "<>", 1).and_where("id", "!==", 2).and_where("id", "==", 3);
    assert_eq!(ids(&q.get().unwrap()), [3]);
}

#[test]
fn where_family_combines_with_and() {
    let mut q = query();
    q.where_in("category.name", ["Shoes", "Hats"])
        .where_not_in("id", [2])
        .where_between("price", 10, 50)
        .where_op("id", Op::Gt, 1);
    assert_eq!(ids(&q.get().unwrap()), [3]);
}

#[test]
fn where_not_between_excludes_missing() {
    let mut q = query();
    q.where_not_between("price", 30, 50);
    assert_eq!(ids(&q.get().unwrap()), [2, 3]);
}

// ============================================================================
// Text matching and callbacks
// ============================================================================

#[test]
fn search_and_like() {
    let mut q = query();
    q.search("title", "RED");
    assert_eq!(ids(&q.get().unwrap()), [1, 3]);

    q.reset();
    q.search("tags", "sal");
    assert_eq!(ids(&q.get().unwrap()), [1, 3]);

    q.reset();
    q.like("title", "%shoe");
    assert_eq!(ids(&q.get().unwrap()), [1, 2]);

    q.reset();
    q.like("title", "red%");
    assert_eq!(ids(&q.get().unwrap()), [3]);
}

#[test]
fn filter_callback_last_registration_wins() {
    let mut q = query();
    q.filter(|r| r["id"] == json!(1))
        .filter(|r| r.get("price").and_then(Value::as_f64).is_some_and(|p| p > 50.0));
    assert_eq!(ids(&q.get().unwrap()), [2]);
}

#[test]
fn transform_changes_result_shape() {
    let mut q = query();
    q.and_where("price", ">", 30)
        .sort("price", Dir::Asc)
        .transform(|r: Record| json!(format!("{}:{}", r["id"], r["title"].as_str().unwrap_or(""))));
    assert_eq!(
        q.get().unwrap(),
        [json!("4:Wool Scarf"), json!("1:Classic Red Shoe"), json!("2:Running Shoe")]
    );
}

// ============================================================================
// Stage ordering
// ============================================================================

#[test]
fn registration_order_does_not_matter() {
    let mut a = query();
    a.limit(2).sort_desc("price").and_where("price", ">", 10);
    let mut b = query();
    b.and_where("price", ">", 10).sort_desc("price").limit(2);
    assert_eq!(a.get().unwrap(), b.get().unwrap());
    assert_eq!(ids(&a.get().unwrap()), [2, 1]);
}

#[test]
fn select_runs_before_where() {
    let mut q = query();
    q.select(["id", "title"]).and_where("price", ">", 30);
    assert!(q.get().unwrap().is_empty());
}

#[test]
fn skip_then_sort_then_limit() {
    let mut q = query();
    q.skip(2).sort_desc("price").limit(2);
    assert_eq!(ids(&q.get().unwrap()), [4, 3]);
}

#[test]
fn sort_puts_missing_last_in_both_directions() {
    let mut q = query();
    q.sort("price", Dir::Asc);
    assert_eq!(ids(&q.get().unwrap()), [3, 4, 1, 2, 5]);
    q.sort_desc("price");
    assert_eq!(ids(&q.get().unwrap()), [2, 1, 4, 3, 5]);
}

// ============================================================================
// Grouping
// ============================================================================

#[test]
fn group_by_with_having() {
    let mut q = query();
    q.group_by("category.name").having(Aggregate::Count, ">", 1);
    let groups = q.get_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, json!("Shoes"));
    assert_eq!(ids(&groups[0].members), [1, 2]);
}

#[test]
fn having_on_field_aggregate() {
    let mut q = query();
    q.group_by("category.name")
        .having_on(Aggregate::Max, "price", "<", 40);
    let keys: Vec<Value> = q.get_groups().unwrap().into_iter().map(|g| g.key).collect();
    assert_eq!(keys, [json!("Hats"), json!("Scarves")]);
}

#[test]
fn having_field_aggregates_need_a_field() {
    let keys = |q: &QueryBuilder<MemorySource>| -> Vec<Value> {
        q.get_groups().unwrap().into_iter().map(|g| g.key).collect()
    };

    // Without a field, sum and max are not registered and every group stays.
    let mut q = example();
    q.group_by("category.name")
        .having(Aggregate::Sum, ">", 50)
        .having(Aggregate::Max, "<", 1000);
    assert!(q.spec().having_conditions().is_empty());
    assert_eq!(keys(&q), [json!("Shoes"), json!("Hats")]);

    let mut q = example();
    q.group_by("category.name")
        .having_on(Aggregate::Sum, "price", ">", 50);
    assert_eq!(keys(&q), [json!("Shoes")]);

    let mut q = example();
    q.group_by("category.name")
        .having_on(Aggregate::Max, "price", "<", 1000);
    assert_eq!(keys(&q), [json!("Shoes"), json!("Hats")]);
}

#[test]
fn grouped_get_returns_member_arrays() {
    let mut q = query();
    q.group_by("category.name").select(["id", "category"]);
    let values = q.get().unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(
        values[0],
        json!([
            {"id": 1, "category": {"name": "Shoes"}},
            {"id": 2, "category": {"name": "Shoes"}}
        ])
    );
    assert_eq!(q.count().unwrap(), 3);
}

// ============================================================================
// Terminals
// ============================================================================

#[test]
fn first_and_value() {
    let mut q = query();
    q.sort_desc("price");
    let first = q.first().unwrap().unwrap();
    assert_eq!(first["id"], json!(2));
    assert_eq!(q.value("category.name"), Some(&json!("Shoes")));
    assert_eq!(q.count().unwrap(), 5);
}

#[test]
fn aggregates() {
    let q = query();
    assert_eq!(q.aggregate("price", Aggregate::Sum).unwrap(), json!(155.5));
    assert_eq!(q.aggregate("price", Aggregate::Count).unwrap(), json!(4));
    assert_eq!(q.aggregate("price", Aggregate::Min).unwrap(), json!(20));
    assert_eq!(
        q.aggregate("category.name", Aggregate::DistinctCount).unwrap(),
        json!(3)
    );
    assert_eq!(q.aggregate("missing", Aggregate::Avg).unwrap(), Value::Null);
    assert_eq!(q.aggregate("missing", Aggregate::Sum).unwrap(), json!(0));
}

#[test]
fn pluck_and_keys() {
    let mut q = query();
    q.and_where("price", ">", 30);
    assert_eq!(q.pluck("title").unwrap(), ["Classic Red Shoe", "Running Shoe", "Wool Scarf"]);

    q.reset();
    q.from("example");
    assert_eq!(q.keys().unwrap(), ["id", "price", "category"]);
}

#[test]
fn newest_oldest_latest() {
    let q = query();
    assert_eq!(q.newest("created_at").unwrap().unwrap()["id"], json!(5));
    assert_eq!(q.oldest("created_at").unwrap().unwrap()["id"], json!(4));
    assert_eq!(q.latest().unwrap().unwrap()["id"], json!(5));
}

#[test]
fn newest_requires_field_on_every_record() {
    let q = query();
    let err = q.newest("category.name").unwrap_err();
    assert!(matches!(err, QueryError::TimeParse { .. }));

    let err = q.oldest("updated_at").unwrap_err();
    assert!(matches!(err, QueryError::FieldNotFound { ref field } if field == "updated_at"));
}

#[test]
fn paginate_clamps_and_reports_empty_pages() {
    let q = query();
    let page = q.paginate(0, 2).unwrap();
    assert_eq!(ids(&page.data), [1, 2]);
    assert_eq!(page.pagination.last_page, 3);

    let page = q.paginate(9, 2).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.pagination.from, None);
}

#[test]
fn to_json_round_trip() {
    let mut q = query();
    q.where_in("id", [1, 3]).select(["id", "tags"]);
    let text = q.to_json().unwrap();
    let decoded: Vec<Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, q.get().unwrap());

    let pretty = q.to_json_pretty().unwrap();
    assert!(pretty.contains('\n'));
    assert_eq!(serde_json::from_str::<Vec<Value>>(&pretty).unwrap(), decoded);
}

// ============================================================================
// Sources and errors
// ============================================================================

struct CountingSource {
    inner: MemorySource,
    calls: Rc<Cell<usize>>,
}

impl DataSource for CountingSource {
    fn fetch(&self, resource: &str) -> jsonq::Result<Vec<Record>> {
        self.calls.set(self.calls.get() + 1);
        self.inner.fetch(resource)
    }
}

#[test]
fn every_terminal_fetches_once() {
    let calls = Rc::new(Cell::new(0));
    let source = CountingSource {
        inner: MemorySource::new().with_json("r", SAMPLE),
        calls: Rc::clone(&calls),
    };
    let mut q = QueryBuilder::new(source);
    q.from("r").and_where("price", ">", 0).sort_desc("id");
    assert_eq!(calls.get(), 0);

    q.get().unwrap();
    q.count().unwrap();
    q.first().unwrap();
    q.paginate(1, 2).unwrap();
    assert_eq!(calls.get(), 4);
}

#[test]
fn source_errors_propagate() {
    let source = MemorySource::new()
        .with_json("broken", "[{\"id\": 1,")
        .with_json("object", r#"{"id": 1}"#);
    let mut q = QueryBuilder::new(source);

    q.from("broken");
    assert!(matches!(q.get(), Err(QueryError::Decode { .. })));

    q.from("object");
    assert!(matches!(q.count(), Err(QueryError::NotACollection { .. })));

    q.from("absent");
    assert!(matches!(q.exists(), Err(QueryError::Retrieval { .. })));
}

#[test]
fn file_source_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("products.json"),
        format!(r#"{{"data": {SAMPLE}}}"#),
    )
    .unwrap();

    let mut q = QueryBuilder::new(FileSource::new().with_root(dir.path()).with_pointer("/data"));
    q.from("products.json").and_where("category.name", "=", "Shoes");
    assert_eq!(ids(&q.get().unwrap()), [1, 2]);
}
