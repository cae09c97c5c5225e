//! Main reldoc crate: dynamic filters with relationship resolution over schema-less
//! JSON document stores.
//!
//! This crate is the primary entry point for users of reldoc. It re-exports the engine
//! and its types from `reldoc-core` and provides access to the storage backends.
//!
//! # Features
//!
//! - **Dynamic filters** - Flat `field_op=value` parameters with `[or]` groups
//! - **Relationship filters** - `author.role=admin` walks `author_id` into `users`
//! - **Population** - `populate=author.company` hydrates foreign keys, batched per level
//! - **Pagination** - Offset pagination with totals and a `has_more` flag
//! - **Multiple backends** - In-memory and MongoDB stores behind one read trait
//!
//! # Quick Start
//!
//! ```ignore
//! use reldoc::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> EngineResult<()> {
//!     let store = InMemoryStore::builder()
//!         .with_json("users", vec![json!({"id": "u1", "role": "admin"})])
//!         .with_json("posts", vec![json!({"id": "p1", "author_id": "u1", "views": 150})])
//!         .build()
//!         .await?;
//!     let engine = QueryEngine::new(store);
//!
//!     let result = engine
//!         .collection("posts")
//!         .find([("author.role", "admin"), ("populate", "author")])
//!         .await?;
//!
//!     assert_eq!(result.ids(), vec!["p1"]);
//!     assert_eq!(result.data[0].data["author"]["role"], "admin");
//!
//!     engine.shutdown().await
//! }
//! ```
//!
//! # Typed Filters
//!
//! Cloud functions pass a JSON map instead of strings; values keep their JSON types:
//!
//! ```ignore
//! let filters = json!({"views_gte": 100, "tag_ids_overlaps": ["t1", "t2"], "limit": 10});
//! let result = engine.db_query("posts", filters.as_object().unwrap()).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use reldoc_core::{
    backend, collection, compiler, config, document, engine, error, executor, literal, page, parser,
    populate, query, relation, request, tree,
};

// Re-export JSON types for convenience
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use reldoc_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use reldoc_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
