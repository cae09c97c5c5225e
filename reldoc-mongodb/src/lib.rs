//! MongoDB backend implementation for reldoc.
//!
//! This crate provides a MongoDB-based implementation of the `StoreReader` trait,
//! pushing filtering, sorting, counting and pagination down to MongoDB's query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! reldoc = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data lives in MongoDB Atlas or self-hosted MongoDB
//! - **Query push-down** - Predicates are translated into native MongoDB filters
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//!
//! # Example
//!
//! ```ignore
//! use reldoc::{backend::StoreBuilder, engine::QueryEngine, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "blog")
//!         .build()
//!         .await?;
//!     let engine = QueryEngine::new(store);
//!
//!     let admins_posts = engine.query_params("posts", [("author.role", "admin")]).await?;
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as reldoc_mongodb;

pub mod store;
pub(crate) mod query;
pub(crate) mod sanitizer;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
