//! Storage backend abstraction consumed by the query engine.
//!
//! The engine only ever reads. A backend exposes three operations: fetching documents by
//! id, scanning a collection with a structured predicate, and listing the collections it
//! holds (the snapshot relationship resolution works against).
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`; the engine issues concurrent reads while compiling
//! relationship filters and populating relations.
//!
//! # Examples
//!
//! ```ignore
//! use reldoc::backend::StoreReader;
//! use reldoc::query::{Expr, Operator, Scan};
//!
//! let page = backend
//!     .scan("posts", Scan::builder().filter(Expr::field("views", Operator::Gte, 100)).build())
//!     .await?;
//! ```

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    document::Document,
    error::EngineResult,
    query::{Scan, ScanPage},
};

/// Read interface of a document store.
#[async_trait]
pub trait StoreReader: Send + Sync + Debug {
    /// Retrieves documents from a collection by their IDs.
    ///
    /// Documents are returned in request order. Unknown IDs (and unknown collections) are
    /// simply omitted from the results.
    async fn fetch_by_ids(&self, collection: &str, ids: Vec<String>) -> EngineResult<Vec<Document>>;

    /// Scans a collection, applying the scan's predicate, sort keys and pagination.
    ///
    /// Sorting must be stable. When `scan.count_total` is set, the returned page carries the
    /// number of matching documents before pagination.
    async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> EngineResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> EngineResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreReader for &B
where
    B: StoreReader + ?Sized,
{
    async fn fetch_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> EngineResult<Vec<Document>> {
        (**self).fetch_by_ids(collection, ids).await
    }

    async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage> {
        (**self).scan(collection, scan).await
    }

    async fn list_collections(&self) -> EngineResult<Vec<String>> {
        (**self).list_collections().await
    }
}

#[async_trait]
impl<B> StoreReader for Arc<B>
where
    B: StoreReader + ?Sized,
{
    async fn fetch_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> EngineResult<Vec<Document>> {
        (**self).fetch_by_ids(collection, ids).await
    }

    async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage> {
        (**self).scan(collection, scan).await
    }

    async fn list_collections(&self) -> EngineResult<Vec<String>> {
        (**self).list_collections().await
    }
}

#[async_trait]
impl StoreReader for Box<dyn StoreReader> {
    async fn fetch_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> EngineResult<Vec<Document>> {
        (**self).fetch_by_ids(collection, ids).await
    }

    async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage> {
        (**self).scan(collection, scan).await
    }

    async fn list_collections(&self) -> EngineResult<Vec<String>> {
        (**self).list_collections().await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBuilder {
    type Backend: StoreReader;

    async fn build(self) -> EngineResult<Self::Backend>;
}
