//! Dynamic filter compilation and relationship resolution over a schema-less JSON
//! document store.
//!
//! This crate is the core of the reldoc project and provides:
//!
//! - **Documents** ([`document`]) - The document model and the user entity view
//! - **Store abstraction** ([`backend`]) - The read interface store adapters implement
//! - **Predicates** ([`query`], [`literal`]) - Store-level expressions and literal coercion
//! - **Filter parsing** ([`parser`], [`tree`], [`request`]) - Wire parameters to boolean trees
//! - **Relationships** ([`relation`]) - Foreign key inference from field names
//! - **Pipeline** ([`compiler`], [`executor`], [`populate`]) - Compilation, execution and hydration
//! - **Engine** ([`engine`], [`collection`]) - The facade tying the pipeline together
//! - **Results** ([`page`]) - Paginated query results
//! - **Configuration** ([`config`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use reldoc::engine::QueryEngine;
//!
//! let engine = QueryEngine::new(store);
//! let result = engine
//!     .collection("posts")
//!     .find([("author.role", "admin"), ("populate", "author")])
//!     .await?;
//!
//! for post in &result.data {
//!     println!("{}: {}", post.id, post.data["author"]);
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as reldoc_core;

pub mod backend;
pub mod collection;
pub mod compiler;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod executor;
pub mod literal;
pub mod page;
pub mod parser;
pub mod populate;
pub mod query;
pub mod relation;
pub mod request;
pub mod tree;
