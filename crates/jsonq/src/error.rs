//! Error types for the jsonq crate.

use thiserror::Error;

/// Errors that can occur when loading data or running a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The resource could not be reached or read.
    #[error("failed to fetch data from {resource}: {reason}")]
    Retrieval { resource: String, reason: String },

    /// The response body is not valid JSON.
    #[error("error decoding JSON from {resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    /// The decoded document is not an array of objects.
    #[error("expected an array of objects from {resource}, found {found}")]
    NotACollection { resource: String, found: String },

    /// A field required by `oldest`/`newest` is absent from a record.
    #[error("field '{field}' does not exist in the data")]
    FieldNotFound { field: String },

    /// A timestamp field could not be parsed.
    #[error("cannot parse {value} in field '{field}' as a timestamp")]
    TimeParse { field: String, value: String },

    /// A `like` pattern could not be compiled.
    #[error("invalid like pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A terminal method ran before `from()` bound a resource.
    #[error("no resource bound; call from() before running the query")]
    MissingResource,

    /// Grouped output was requested from a query without `group_by`.
    #[error("query has no group_by stage")]
    NotGrouped,

    /// Results could not be serialized.
    #[error("failed to serialize results: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl QueryError {
    /// Creates a retrieval error.
    pub fn retrieval(resource: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        QueryError::Retrieval {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for jsonq operations.
pub type Result<T> = std::result::Result<T, QueryError>;
