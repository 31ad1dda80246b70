//! jsonq - Fluent, deferred-execution queries over JSON collections.
//!
//! jsonq fetches an array of JSON objects from a resource (usually an HTTP
//! endpoint) and runs a query over it in memory. Queries are built with
//! chained calls that only record what to do; nothing is fetched until a
//! terminal method such as `get`, `count` or `paginate` runs.
//!
//! # Quick Start
//!
//! ```rust
//! use jsonq::{Aggregate, Dir, MemorySource, QueryBuilder};
//! use serde_json::json;
//!
//! let source = MemorySource::new().with_json("products", r#"[
//!     {"id": 1, "title": "Red Shoe",  "price": 40, "category": {"name": "Shoes"}},
//!     {"id": 2, "title": "Blue Shoe", "price": 60, "category": {"name": "Shoes"}},
//!     {"id": 3, "title": "Red Hat",   "price": 20, "category": {"name": "Hats"}}
//! ]"#);
//!
//! let mut query = QueryBuilder::new(source);
//! let results = query
//!     .from("products")
//!     .and_where("price", ">", 30)
//!     .search("title", "shoe")
//!     .sort("price", Dir::Desc)
//!     .get()?;
//!
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0]["id"], json!(2));
//!
//! query.reset();
//! assert_eq!(query.aggregate("price", Aggregate::Sum)?, json!(120));
//! # Ok::<(), jsonq::QueryError>(())
//! ```
//!
//! # Pipeline
//!
//! Stages run in a fixed order regardless of registration order:
//!
//! ```text
//! select -> where* -> distinct -> search -> like -> filter
//!        -> group_by -> having -> skip -> sort -> transform -> limit
//! ```
//!
//! All `where*` predicates, searches, likes and having conditions combine
//! with AND. `filter` and `transform` hold one callback each; registering
//! another replaces the first.
//!
//! # Comparison
//!
//! | Operands | `=` `!=` | `>` `>=` `<` `<=` |
//! |----------|----------|-------------------|
//! | same type | structural equality | bool, number and string only |
//! | integer vs float | numeric | numeric |
//! | different types | never equal | `false` |
//!
//! A missing field compares as `null`. Unknown operators never match.
//!
//! # Sources
//!
//! - [`HttpSource`] (feature `http`, on by default)
//! - [`FileSource`]
//! - [`MemorySource`]
//!
//! Implement [`DataSource`] to query anything else.

mod aggregate;
mod builder;
mod condition;
mod error;
mod executor;
mod op;
mod ordering;
mod paginate;
pub mod path;
mod source;
mod spec;
mod time;
mod value;

// Re-export public API
pub use aggregate::{Aggregate, UnknownAggregate};
pub use builder::QueryBuilder;
pub use condition::{compare_with, evaluate, evaluate_op, Condition, Predicate};
pub use error::{QueryError, Result};
pub use executor::{Group, QueryExecutor, QueryOutput};
pub use op::{Op, UnknownOperator};
pub use ordering::{compare_values, Dir, OrderBy, UnknownDirection};
pub use paginate::{Page, Pagination};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{decode_records, into_records, DataSource, FileSource, MemorySource};
pub use spec::{FilterFn, HavingCondition, QuerySpec, TextMatch, TransformFn};
pub use time::parse_timestamp;
pub use value::{compare_strict, strict_eq, type_name, Number, Record, Value};
