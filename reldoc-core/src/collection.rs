//! Collection handles.
//!
//! A [`CollectionRef`] binds a [`QueryEngine`] to one collection name, which is the shape
//! SDK callers work with:
//!
//! ```ignore
//! let posts = engine.collection("posts");
//!
//! let popular = posts.find([("views_gte", "100"), ("sort", "-views")]).await?;
//! let first = posts.get(vec!["p1".to_string()], &[PopulateSpec::parse("author")?]).await?;
//! ```

use serde_json::{Map, Value};

use crate::{
    backend::StoreReader,
    document::Document,
    engine::QueryEngine,
    error::EngineResult,
    page::QueryResult,
    request::{PopulateSpec, QueryParams, QueryRequest, QueryRequestBuilder},
};

/// A collection with a reference to the engine that queries it.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the engine reference
/// * `S` - The store implementation
#[derive(Debug)]
pub struct CollectionRef<'a, S: StoreReader> {
    name: String,
    engine: &'a QueryEngine<S>,
}

impl<'a, S: StoreReader> CollectionRef<'a, S> {
    /// Creates a new collection handle (internal use).
    pub(crate) fn new(name: String, engine: &'a QueryEngine<S>) -> Self {
        Self { name, engine }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts a request against this collection.
    pub fn request(&self) -> QueryRequestBuilder {
        QueryRequest::builder(self.name.clone())
    }

    /// Queries the collection with wire parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - Filter and reserved parameters, e.g. `[("age_gte", "18"), ("limit", "10")]`
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`](crate::error::EngineError) if the parameters are invalid or
    /// the store fails.
    pub async fn find<K, V>(
        &self,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> EngineResult<QueryResult>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.engine.query_params(&self.name, params).await
    }

    /// Queries the collection with a typed JSON parameter map.
    pub async fn find_json(&self, params: &Map<String, Value>) -> EngineResult<QueryResult> {
        let request = QueryParams::parse_json(params)?
            .into_request(self.name.clone(), self.engine.config())?;

        self.engine.query(request).await
    }

    /// Runs a prepared request; its collection is replaced by this one.
    pub async fn query(&self, mut request: QueryRequest) -> EngineResult<QueryResult> {
        request.collection = self.name.clone();

        self.engine.query(request).await
    }

    /// Retrieves documents by id, in request order, populating `populate`.
    ///
    /// # Arguments
    ///
    /// * `ids` - The document ids to fetch; unknown ids are omitted
    /// * `populate` - Relations to hydrate on the fetched documents
    pub async fn get(
        &self,
        ids: Vec<String>,
        populate: &[PopulateSpec],
    ) -> EngineResult<Vec<Document>> {
        self.engine.get(&self.name, ids, populate).await
    }

    /// Retrieves one document by id.
    pub async fn get_one(
        &self,
        id: &str,
        populate: &[PopulateSpec],
    ) -> EngineResult<Option<Document>> {
        Ok(self
            .get(vec![id.to_string()], populate)
            .await?
            .into_iter()
            .next())
    }
}
