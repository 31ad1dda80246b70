//! Data sources.
//!
//! A [`DataSource`] turns a resource identifier into a record set. The query
//! engine treats the identifier as opaque and calls the source once per
//! terminal operation.
//!
//! Provided sources:
//! - [`HttpSource`] (feature `http`): blocking HTTP GET of a JSON document.
//! - [`FileSource`]: reads a JSON document from disk.
//! - [`MemorySource`]: serves documents or records held in memory.

use std::collections::HashMap;
use std::path::PathBuf;
#[cfg(feature = "http")]
use std::time::Duration;

use tracing::debug;

use crate::error::{QueryError, Result};
use crate::value::{type_name, Record, Value};

/// Something that can load a record set for a resource identifier.
pub trait DataSource {
    /// Loads all records for `resource`.
    ///
    /// Fails with [`QueryError::Retrieval`] if the resource cannot be read,
    /// [`QueryError::Decode`] if it is not JSON, and
    /// [`QueryError::NotACollection`] if it is not an array of objects.
    fn fetch(&self, resource: &str) -> Result<Vec<Record>>;
}

impl<T: DataSource + ?Sized> DataSource for &T {
    fn fetch(&self, resource: &str) -> Result<Vec<Record>> {
        (**self).fetch(resource)
    }
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn fetch(&self, resource: &str) -> Result<Vec<Record>> {
        (**self).fetch(resource)
    }
}

impl<T: DataSource + ?Sized> DataSource for std::rc::Rc<T> {
    fn fetch(&self, resource: &str) -> Result<Vec<Record>> {
        (**self).fetch(resource)
    }
}

/// Decodes a JSON document into records.
///
/// With a `pointer` (RFC 6901, e.g. `/data`), the collection is read from
/// that location inside the document.
pub fn decode_records(resource: &str, body: &str, pointer: Option<&str>) -> Result<Vec<Record>> {
    let document: Value = serde_json::from_str(body).map_err(|source| QueryError::Decode {
        resource: resource.to_string(),
        source,
    })?;
    into_records(resource, document, pointer)
}

/// Extracts records from an already-decoded document.
pub fn into_records(resource: &str, mut document: Value, pointer: Option<&str>) -> Result<Vec<Record>> {
    let collection = match pointer {
        Some(pointer) => match document.pointer_mut(pointer) {
            Some(value) => value.take(),
            None => {
                return Err(QueryError::NotACollection {
                    resource: resource.to_string(),
                    found: format!("nothing at {pointer}"),
                })
            }
        },
        None => document,
    };

    let items = match collection {
        Value::Array(items) => items,
        other => {
            return Err(QueryError::NotACollection {
                resource: resource.to_string(),
                found: type_name(&other).to_string(),
            })
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(QueryError::NotACollection {
                resource: resource.to_string(),
                found: format!("array containing {}", type_name(&other)),
            }),
        })
        .collect()
}

// ============================================================================
// HTTP
// ============================================================================

/// Fetches JSON over HTTP(S) with a blocking GET.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use jsonq::{HttpSource, QueryBuilder};
///
/// let source = HttpSource::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_pointer("/data");
///
/// let mut query = QueryBuilder::new(source);
/// let titles = query
///     .from("https://api.example.com/products")
///     .and_where("price", ">", 30)
///     .pluck("title")?;
/// # Ok::<(), jsonq::QueryError>(())
/// ```
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    timeout: Duration,
    user_agent: String,
    pointer: Option<String>,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a source with default settings.
    pub fn new() -> Self {
        HttpSource {
            timeout: Self::DEFAULT_TIMEOUT,
            user_agent: concat!("jsonq/", env!("CARGO_PKG_VERSION")).to_string(),
            pointer: None,
        }
    }

    /// Sets the overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Reads the collection from a JSON pointer inside the response.
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }
}

#[cfg(feature = "http")]
impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
impl DataSource for HttpSource {
    fn fetch(&self, resource: &str) -> Result<Vec<Record>> {
        debug!(resource, timeout_ms = self.timeout.as_millis() as u64, "http fetch");
        let agent = ureq::AgentBuilder::new()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build();
        let response = agent
            .get(resource)
            .set("Accept", "application/json")
            .call()
            .map_err(|e| QueryError::retrieval(resource, e))?;
        // Streamed, so there is no ceiling on the body size.
        let reader = std::io::BufReader::new(response.into_reader());
        let document: Value = serde_json::from_reader(reader).map_err(|e| {
            if e.is_io() {
                QueryError::retrieval(resource, e)
            } else {
                QueryError::Decode {
                    resource: resource.to_string(),
                    source: e,
                }
            }
        })?;
        into_records(resource, document, self.pointer.as_deref())
    }
}

// ============================================================================
// Files
// ============================================================================

/// Reads JSON documents from the filesystem.
///
/// The resource identifier is a path, resolved against the root if one is set.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
    pointer: Option<String>,
}

impl FileSource {
    /// Creates a source that resolves paths against the working directory.
    pub fn new() -> Self {
        FileSource::default()
    }

    /// Resolves relative resource paths against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Reads the collection from a JSON pointer inside each document.
    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    fn resolve(&self, resource: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(resource),
            None => PathBuf::from(resource),
        }
    }
}

impl DataSource for FileSource {
    fn fetch(&self, resource: &str) -> Result<Vec<Record>> {
        let path = self.resolve(resource);
        debug!(path = %path.display(), "file fetch");
        let body =
            std::fs::read_to_string(&path).map_err(|e| QueryError::retrieval(resource, e))?;
        decode_records(resource, &body, self.pointer.as_deref())
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Clone)]
enum Entry {
    Json(String),
    Document(Value),
    Records(Vec<Record>),
}

/// Serves resources from memory.
///
/// Useful for tests and for querying data obtained some other way. Unknown
/// resources fail with [`QueryError::Retrieval`].
///
/// ```
/// use jsonq::{DataSource, MemorySource};
///
/// let source = MemorySource::new().with_json("products", r#"[{"id": 1}]"#);
/// assert_eq!(source.fetch("products").unwrap().len(), 1);
/// assert!(source.fetch("users").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: HashMap<String, Entry>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        MemorySource::default()
    }

    /// Serves raw JSON text for `resource`. Decoding happens on every fetch.
    pub fn with_json(mut self, resource: impl Into<String>, body: impl Into<String>) -> Self {
        self.entries
            .insert(resource.into(), Entry::Json(body.into()));
        self
    }

    /// Serves a decoded document for `resource`.
    pub fn with_document(mut self, resource: impl Into<String>, document: Value) -> Self {
        self.entries
            .insert(resource.into(), Entry::Document(document));
        self
    }

    /// Serves records for `resource`.
    pub fn with_records(mut self, resource: impl Into<String>, records: Vec<Record>) -> Self {
        self.entries
            .insert(resource.into(), Entry::Records(records));
        self
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, resource: &str) -> Result<Vec<Record>> {
        debug!(resource, "memory fetch");
        match self.entries.get(resource) {
            Some(Entry::Json(body)) => decode_records(resource, body, None),
            Some(Entry::Document(document)) => into_records(resource, document.clone(), None),
            Some(Entry::Records(records)) => Ok(records.clone()),
            None => Err(QueryError::retrieval(resource, "no such resource")),
        }
    }
}
