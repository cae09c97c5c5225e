//! Query results.
//!
//! A [`QueryResult`] is one page of documents plus the pagination metadata the listing
//! endpoint returns. It serializes to the wire shape directly:
//!
//! ```text
//! {"data": [{"id": "p1", ...}], "total": 2, "limit": 50, "offset": 0, "has_more": false}
//! ```

use serde::{Serialize, Serializer, de::DeserializeOwned, ser::SerializeSeq};

use crate::{
    document::Document,
    error::{EngineResult, QueryWarning},
};

/// A single page of query results.
///
/// # Example
///
/// ```ignore
/// use reldoc::page::QueryResult;
///
/// let result = QueryResult::builder(documents)
///     .with_total(Some(100))
///     .with_limit(50)
///     .with_has_more(true)
///     .build();
/// ```
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Documents in this page, each serialized as its flat entity.
    #[serde(serialize_with = "serialize_entities")]
    pub data: Vec<Document>,
    /// Number of matching documents across all pages, when counted.
    pub total: Option<usize>,
    /// The effective page size.
    pub limit: usize,
    /// Number of matching documents skipped before this page.
    pub offset: usize,
    /// Whether another page follows this one.
    pub has_more: bool,
    /// Non-fatal conditions met while answering the query.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<QueryWarning>,
}

impl QueryResult {
    /// Creates a new builder for constructing a result with custom settings.
    pub fn builder(data: Vec<Document>) -> QueryResultBuilder {
        QueryResultBuilder::new(data)
    }

    /// Returns the document ids in page order.
    pub fn ids(&self) -> Vec<&str> {
        self.data
            .iter()
            .map(|document| document.id.as_str())
            .collect()
    }

    /// Deserializes every document into a caller-defined type.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Serialization`](crate::error::EngineError::Serialization) if
    /// any document does not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> EngineResult<Vec<T>> {
        self.data.iter().map(|document| document.decode()).collect()
    }
}

impl Default for QueryResult {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: None,
            limit: 0,
            offset: 0,
            has_more: false,
            warnings: Vec::new(),
        }
    }
}

fn serialize_entities<S: Serializer>(data: &[Document], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(data.len()))?;

    for document in data {
        seq.serialize_element(&document.to_entity())?;
    }

    seq.end()
}

/// Builder for constructing [`QueryResult`] instances with fluent API.
pub struct QueryResultBuilder {
    result: QueryResult,
}

impl QueryResultBuilder {
    /// Creates a new builder with the given documents.
    pub fn new(data: Vec<Document>) -> Self {
        Self {
            result: QueryResult { data, ..QueryResult::default() },
        }
    }

    /// Sets the total count of matching documents.
    pub fn with_total(mut self, total: Option<usize>) -> Self {
        self.result.total = total;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.result.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.result.offset = offset;
        self
    }

    pub fn with_has_more(mut self, has_more: bool) -> Self {
        self.result.has_more = has_more;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<QueryWarning>) -> Self {
        self.result.warnings = warnings;
        self
    }

    /// Builds and returns the final [`QueryResult`] instance.
    pub fn build(self) -> QueryResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_wire_shape() {
        let document = Document::from_json(
            "posts",
            json!({"id": "p1", "title": "A", "created_at": "2024-01-01T00:00:00Z"}),
        )
        .unwrap();
        let result = QueryResult::builder(vec![document])
            .with_total(Some(1))
            .with_limit(50)
            .build();

        let wire = serde_json::to_value(&result).unwrap();

        assert_eq!(wire["data"][0]["id"], json!("p1"));
        assert_eq!(wire["data"][0]["title"], json!("A"));
        assert_eq!(wire["total"], json!(1));
        assert_eq!(wire["has_more"], json!(false));
        assert!(wire.get("warnings").is_none());
    }

    #[test]
    fn includes_warnings_when_present() {
        let result = QueryResult::builder(Vec::new())
            .with_warnings(vec![QueryWarning::PopulationDepthExceeded {
                spec: "a.b.c".to_string(),
                max: 2,
            }])
            .build();

        let wire = serde_json::to_value(&result).unwrap();

        assert_eq!(wire["warnings"][0]["kind"], json!("population_depth_exceeded"));
        assert_eq!(wire["warnings"][0]["spec"], json!("a.b.c"));
    }
}
