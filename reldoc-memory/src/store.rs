//! In-memory storage implementation.
//!
//! This module provides a simple in-memory store that keeps documents in
//! id-ordered maps behind an async-safe read-write lock.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::debug;

use reldoc_core::{
    backend::{StoreBuilder, StoreReader},
    document::Document,
    error::{EngineError, EngineResult},
    query::{Scan, ScanPage},
};

use crate::evaluator::{DocumentEvaluator, compare_documents};

/// Documents of one collection, keyed (and therefore ordered) by id.
type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document store.
///
/// This struct implements [`StoreReader`] over documents held entirely in memory.
/// Writes go through the inherent [`InMemoryStore::insert_documents`] method; the
/// query engine itself only reads.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Scans evaluate every document in a collection (no indexing). For small to medium
/// datasets this is typically acceptable. For larger datasets, consider using a
/// persistent backend like MongoDB.
///
/// # Example
///
/// ```ignore
/// use reldoc_memory::InMemoryStore;
/// use serde_json::json;
///
/// let store = InMemoryStore::builder()
///     .with_json("users", vec![json!({"id": "u1", "role": "admin"})])
///     .build()
///     .await?;
///
/// assert_eq!(store.list_collections().await?, vec!["users".to_string()]);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with seed data.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use reldoc_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Creates an empty collection if it does not exist yet.
    pub async fn create_collection(&self, name: &str) {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Inserts new documents into a collection, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DocumentAlreadyExists`] if a document with the same id is
    /// already stored; documents before it in `documents` stay inserted.
    pub async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> EngineResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        for mut doc in documents {
            if collection_map.contains_key(&doc.id) {
                return Err(EngineError::DocumentAlreadyExists(doc.id, collection.to_string()));
            }

            doc.collection = collection.to_string();
            collection_map.insert(doc.id.clone(), doc);
        }

        Ok(())
    }

    /// Inserts JSON objects as documents; see [`Document::from_json`].
    pub async fn insert_json(&self, collection: &str, values: Vec<Value>) -> EngineResult<()> {
        let documents = values
            .into_iter()
            .map(|value| Document::from_json(collection, value))
            .collect::<EngineResult<Vec<_>>>()?;

        self.insert_documents(collection, documents).await
    }
}

#[async_trait]
impl StoreReader for InMemoryStore {
    async fn fetch_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> EngineResult<Vec<Document>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut documents = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(doc) = collection_map.get(&id) {
                documents.push(doc.clone());
            }
        }

        Ok(documents)
    }

    async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(ScanPage { documents: vec![], total: scan.count_total.then_some(0) }),
        };

        // Apply filter expressions if present
        let mut matched = match &scan.filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection_map.values(), filter),
            None => collection_map.values().collect::<Vec<_>>(),
        };

        // Stable sort over the id-ordered scan
        if !scan.sort.is_empty() {
            matched.sort_by(|a, b| compare_documents(a, b, &scan.sort));
        }

        let total = scan.count_total.then_some(matched.len());
        let documents = matched
            .into_iter()
            .skip(scan.offset)
            .take(scan.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect::<Vec<_>>();

        debug!(collection, returned = documents.len(), ?total, "memory scan");

        Ok(ScanPage { documents, total })
    }

    async fn list_collections(&self) -> EngineResult<Vec<String>> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();

        Ok(names)
    }
}

/// Builder for constructing [`InMemoryStore`] instances with seed data.
///
/// # Example
///
/// ```ignore
/// use reldoc_memory::InMemoryStore;
/// use reldoc::backend::StoreBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder()
///         .with_collection("tags", vec![])
///         .build()
///         .await
///         .unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    documents: Vec<(String, Vec<Document>)>,
    json: Vec<(String, Vec<Value>)>,
}

impl InMemoryStoreBuilder {
    /// Seeds a collection with documents; an empty list still creates the collection.
    pub fn with_collection(mut self, name: impl Into<String>, documents: Vec<Document>) -> Self {
        self.documents.push((name.into(), documents));
        self
    }

    /// Seeds a collection with JSON objects.
    pub fn with_json(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.json.push((name.into(), values));
        self
    }
}

#[async_trait]
impl StoreBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds a new [`InMemoryStore`] holding the seed data.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDocument`] for malformed JSON seeds and
    /// [`EngineError::DocumentAlreadyExists`] for duplicate ids.
    async fn build(self) -> EngineResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (name, documents) in self.documents {
            store.create_collection(&name).await;
            store.insert_documents(&name, documents).await?;
        }
        for (name, values) in self.json {
            store.create_collection(&name).await;
            store.insert_json(&name, values).await?;
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reldoc_core::query::{Expr, Operator, SortOrder};
    use serde_json::json;

    async fn posts() -> InMemoryStore {
        InMemoryStore::builder()
            .with_json(
                "posts",
                vec![
                    json!({"id": "p3", "views": 10}),
                    json!({"id": "p1", "views": 150}),
                    json!({"id": "p2", "views": 50}),
                ],
            )
            .with_collection("tags", vec![])
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fetches_in_request_order_skipping_unknown_ids() {
        let store = posts().await;

        let docs = store
            .fetch_by_ids("posts", vec!["p2".into(), "nope".into(), "p1".into()])
            .await
            .unwrap();

        assert_eq!(docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["p2", "p1"]);
        assert!(store.fetch_by_ids("missing", vec!["p1".into()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scans_filter_sort_and_paginate() {
        let store = posts().await;
        let scan = Scan::builder()
            .filter(Expr::field("views", Operator::Gte, 20))
            .sort("views", SortOrder::Desc)
            .limit(1)
            .count_total(true)
            .build();

        let page = store.scan("posts", scan).await.unwrap();

        assert_eq!(page.total, Some(2));
        assert_eq!(page.documents.len(), 1);
        assert_eq!(page.documents[0].id, "p1");
    }

    #[tokio::test]
    async fn unsorted_scans_are_id_ordered() {
        let store = posts().await;

        let page = store.scan("posts", Scan::default()).await.unwrap();

        assert_eq!(
            page.documents.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["p1", "p2", "p3"]
        );
        assert_eq!(page.total, None);
    }

    #[tokio::test]
    async fn lists_collections_including_empty_ones() {
        let store = posts().await;

        assert_eq!(
            store.list_collections().await.unwrap(),
            vec!["posts".to_string(), "tags".to_string()]
        );
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let store = posts().await;

        let err = store
            .insert_json("posts", vec![json!({"id": "p1"})])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::DocumentAlreadyExists(id, _) if id == "p1"));
    }
}
