//! Error and warning types for query compilation and execution.
//!
//! Fatal conditions are reported through [`EngineError`] and abort the current request.
//! Conditions the engine can recover from are reported as [`QueryWarning`] values, which
//! are logged and attached to the [`QueryResult`](crate::page::QueryResult).

use serde::Serialize;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all fatal errors that can occur while compiling or executing a query.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A filter key, filter value, populate spec or wire parameter could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),
    /// A filter path traverses more relations than the configured maximum.
    #[error("Unsupported filter depth: `{path}` traverses {depth} relations (max {max})")]
    UnsupportedFilterDepth {
        /// The offending field path.
        path: String,
        /// Number of relation hops in the path.
        depth: usize,
        /// The configured maximum.
        max: usize,
    },
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A stored document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl EngineError {
    /// Returns `true` for errors caused by the request itself (a 400-equivalent).
    ///
    /// These are never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Parse(_) | EngineError::UnsupportedFilterDepth { .. }
        )
    }
}

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<SerdeJsonError> for EngineError {
    fn from(err: SerdeJsonError) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// A non-fatal condition encountered while answering a query.
///
/// Warnings never abort the request; the query proceeds with a documented fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryWarning {
    /// A relationship field pointed at a collection that does not exist, so the
    /// user collection was used instead.
    #[error("Relationship field `{field}` has no collection `{missing}`; using `{fallback}`")]
    RelationshipResolutionAmbiguous {
        field: String,
        missing: String,
        fallback: String,
    },
    /// A populate spec was longer than the configured maximum depth and was truncated.
    #[error("Populate spec `{spec}` exceeds max depth {max}; deeper relations left unpopulated")]
    PopulationDepthExceeded { spec: String, max: usize },
}
