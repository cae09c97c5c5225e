//! The query engine facade.
//!
//! [`QueryEngine`] drives a request through the whole pipeline:
//!
//! ```text
//! QueryParams -> BooleanTree -> QueryCompiler -> QueryExecutor -> PopulationEngine -> QueryResult
//! ```
//!
//! The engine holds nothing but the store and its configuration; every request builds its
//! own relationship resolver from a fresh snapshot of the store's collections.
//!
//! # Example
//!
//! ```ignore
//! use reldoc::engine::QueryEngine;
//!
//! let engine = QueryEngine::new(store);
//! let result = engine
//!     .query_params("posts", [("views_gte", "100"), ("populate", "author")])
//!     .await?;
//! ```

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::{
    backend::StoreReader,
    collection::CollectionRef,
    compiler::QueryCompiler,
    config::EngineConfig,
    document::{Document, ID_FIELD},
    error::{EngineResult, QueryWarning},
    executor::QueryExecutor,
    page::QueryResult,
    populate::{PopulateTree, PopulationEngine},
    relation::{RelationshipResolver, relation_name},
    request::{PopulateSpec, QueryParams, QueryRequest},
};

/// Answers dynamic filter queries against a store.
///
/// # Type Parameters
///
/// * `S` - The store implementation
#[derive(Debug)]
pub struct QueryEngine<S: StoreReader> {
    store: S,
    config: EngineConfig,
}

impl<S: StoreReader> QueryEngine<S> {
    /// Creates an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gets a handle on the collection with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the collection
    pub fn collection<'a>(&'a self, name: &str) -> CollectionRef<'a, S> {
        CollectionRef::new(name.to_string(), self)
    }

    /// Runs a query request.
    ///
    /// # Errors
    ///
    /// * [`EngineError::Parse`](crate::error::EngineError::Parse) or
    ///   [`EngineError::UnsupportedFilterDepth`](crate::error::EngineError::UnsupportedFilterDepth)
    ///   for invalid requests.
    /// * Store errors, propagated unchanged.
    pub async fn query(&self, request: QueryRequest) -> EngineResult<QueryResult> {
        debug!(
            collection = %request.collection,
            clauses = request.filter.clauses().count(),
            populate = request.populate.len(),
            "executing query"
        );

        let resolver = self.resolver_for(&request).await?;
        let compiled = QueryCompiler::new(&self.store, &resolver, &self.config)
            .compile(&request.filter)
            .await?;
        let page = QueryExecutor::new(&self.store, &self.config)
            .execute(&request, compiled.filter)
            .await?;
        let (mut documents, population_warnings) =
            PopulationEngine::new(&self.store, &resolver, &self.config)
                .populate(page.documents, &request.populate)
                .await?;

        let mut warnings = compiled.warnings;
        for warning in population_warnings {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }
        log_warnings(&request.collection, &warnings);

        if let Some(select) = &request.select {
            let (populated, _) =
                PopulateTree::build(&request.populate, self.config.max_populate_depth);
            let populated = populated
                .relations()
                .map(relation_name)
                .collect::<BTreeSet<_>>();

            documents = documents
                .into_iter()
                .map(|document| project(document, select, &populated))
                .collect();
        }

        Ok(QueryResult::builder(documents)
            .with_total(page.total)
            .with_limit(page.limit)
            .with_offset(page.offset)
            .with_has_more(page.has_more)
            .with_warnings(warnings)
            .build())
    }

    /// Runs a query described by wire parameters such as a decoded query string.
    pub async fn query_params<K, V>(
        &self,
        collection: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> EngineResult<QueryResult>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let request = QueryParams::parse(params)?.into_request(collection, &self.config)?;

        self.query(request).await
    }

    /// Runs a query from a typed JSON filter map, as issued by cloud functions.
    ///
    /// Reserved keys (`populate`, `limit`, ...) are honoured the same way as in
    /// [`QueryEngine::query_params`]; filter values keep their JSON types.
    pub async fn db_query(
        &self,
        collection: &str,
        filters: &Map<String, Value>,
    ) -> EngineResult<QueryResult> {
        let request = QueryParams::parse_json(filters)?.into_request(collection, &self.config)?;

        self.query(request).await
    }

    /// Fetches documents by id, in request order, and populates them.
    ///
    /// Unknown ids are omitted.
    pub async fn get(
        &self,
        collection: &str,
        ids: Vec<String>,
        populate: &[PopulateSpec],
    ) -> EngineResult<Vec<Document>> {
        let documents = self.store.fetch_by_ids(collection, ids).await?;

        if populate.is_empty() {
            return Ok(documents);
        }

        let resolver = RelationshipResolver::new(
            self.config.resolver.clone(),
            self.store.list_collections().await?,
        );
        let (documents, warnings) = PopulationEngine::new(&self.store, &resolver, &self.config)
            .populate(documents, populate)
            .await?;
        log_warnings(collection, &warnings);

        Ok(documents)
    }

    /// Shuts down the underlying store.
    pub async fn shutdown(self) -> EngineResult<()> {
        self.store.shutdown().await
    }

    async fn resolver_for(&self, request: &QueryRequest) -> EngineResult<RelationshipResolver> {
        let walks_relations = request
            .filter
            .clauses()
            .any(|clause| !clause.path.is_direct());
        let collections = if walks_relations || !request.populate.is_empty() {
            self.store.list_collections().await?
        } else {
            Vec::new()
        };

        Ok(RelationshipResolver::new(self.config.resolver.clone(), collections))
    }
}

fn log_warnings(collection: &str, warnings: &[QueryWarning]) {
    for warning in warnings {
        warn!(collection, %warning, "query warning");
    }
}

/// Selected field paths, nested by segment.
#[derive(Debug, Default)]
struct Selection(BTreeMap<String, Selection>);

impl Selection {
    fn parse(fields: &[String]) -> Self {
        let mut root = Selection::default();

        for field in fields {
            let mut node = &mut root;
            for segment in field.split('.') {
                node = node.0.entry(segment.to_string()).or_default();
            }
        }

        root
    }

    fn apply(&self, value: Value) -> Value {
        match value {
            Value::Object(object) if !self.0.is_empty() => Value::Object(
                object
                    .into_iter()
                    .filter_map(|(key, value)| match self.0.get(&key) {
                        Some(nested) => Some((key, nested.apply(value))),
                        None if key == ID_FIELD => Some((key, value)),
                        None => None,
                    })
                    .collect(),
            ),
            Value::Array(items) if !self.0.is_empty() => {
                Value::Array(items.into_iter().map(|item| self.apply(item)).collect())
            }
            value => value,
        }
    }
}

/// Keeps the selected data fields plus populated relations; nested selections such as
/// `author.email` trim hydrated entities.
fn project(mut document: Document, select: &[String], populated: &BTreeSet<&str>) -> Document {
    let selection = Selection::parse(select);

    document.data = std::mem::take(&mut document.data)
        .into_iter()
        .filter_map(|(key, value)| match selection.0.get(&key) {
            Some(nested) => Some((key, nested.apply(value))),
            None if populated.contains(key.as_str()) => Some((key, value)),
            None => None,
        })
        .collect();

    document
}
