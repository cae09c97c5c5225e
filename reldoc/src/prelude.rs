//! Convenient re-exports of commonly used types from reldoc.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use reldoc::prelude::*;
//! ```
//!
//! This provides access to:
//! - The engine, collection handles and configuration
//! - Store traits and builders
//! - Requests, filters and predicates
//! - Results, warnings and error types

pub use reldoc_core::{
    backend::{StoreBuilder, StoreReader},
    collection::CollectionRef,
    config::{EngineConfig, ResolverConfig},
    document::{Document, UserEntity},
    engine::QueryEngine,
    error::{EngineError, EngineResult, QueryWarning},
    literal::Literal,
    page::QueryResult,
    parser::{FieldPath, FilterClause, FilterParser},
    query::{Expr, Operator, QueryVisitor, Scan, ScanPage, Sort, SortOrder},
    relation::{Cardinality, RelationshipDescriptor, RelationshipResolver},
    request::{PopulateSpec, QueryParams, QueryRequest},
    tree::BooleanTree,
};
