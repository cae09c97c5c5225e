//! In-memory document store for reldoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreReader` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads using async-aware RwLock
//! - **Schema-less storage** - Documents are arbitrary JSON objects
//! - **Full predicate support** - Every filter operator, with the engine's coercion rules
//! - **Stable ordering** - Multi-key sorts over an id-ordered base
//!
//! # Quick Start
//!
//! ```ignore
//! use reldoc::{engine::QueryEngine, memory::InMemoryStore};
//! use reldoc::backend::StoreBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder()
//!         .with_json("users", vec![json!({"id": "u1", "role": "admin"})])
//!         .with_json("posts", vec![json!({"id": "p1", "author_id": "u1"})])
//!         .build()
//!         .await?;
//!
//!     let engine = QueryEngine::new(store);
//!     let result = engine.query_params("posts", [("author.role", "admin")]).await?;
//!     assert_eq!(result.ids(), vec!["p1"]);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as reldoc_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
