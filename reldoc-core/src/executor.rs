//! Runs compiled predicates against the store.

use tracing::debug;

use crate::{
    backend::StoreReader,
    config::EngineConfig,
    document::{Document, ID_FIELD},
    error::EngineResult,
    query::{Expr, Scan, SortOrder},
    request::QueryRequest,
};

/// One executed page, before population.
#[derive(Debug, Clone, Default)]
pub struct ExecutedPage {
    pub documents: Vec<Document>,
    pub total: Option<usize>,
    /// The effective (clamped) limit.
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// Issues scans for a store.
///
/// Pagination is applied after sorting; sorts always end with an `id` key so pages
/// partition the result set.
pub struct QueryExecutor<'a, S: ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S> QueryExecutor<'a, S>
where
    S: StoreReader + ?Sized,
{
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Executes one page of `request` with an already compiled filter.
    ///
    /// One extra row is fetched to compute `has_more`.
    ///
    /// # Errors
    ///
    /// Propagates store failures unchanged.
    pub async fn execute(
        &self,
        request: &QueryRequest,
        filter: Option<Expr>,
    ) -> EngineResult<ExecutedPage> {
        let limit = self.config.clamp_limit(request.limit);
        let mut scan = Scan::builder()
            .offset(request.offset)
            .limit(limit.saturating_add(1))
            .count_total(request.count_total);

        if let Some(filter) = filter {
            scan = scan.filter(filter);
        }
        match request.sort.as_deref() {
            Some(ID_FIELD) | None => scan = scan.sort(ID_FIELD, request.order),
            Some(field) => {
                scan = scan
                    .sort(field, request.order)
                    .sort(ID_FIELD, SortOrder::Asc)
            }
        }

        let page = self
            .store
            .scan(&request.collection, scan.build())
            .await?;
        let mut documents = page.documents;
        let has_more = documents.len() > limit;

        documents.truncate(limit);

        debug!(
            collection = %request.collection,
            returned = documents.len(),
            total = ?page.total,
            has_more,
            "executed scan"
        );

        Ok(ExecutedPage {
            documents,
            total: page.total,
            limit,
            offset: request.offset,
            has_more,
        })
    }

    /// Collects the ids of every document in `collection` matching `filter`.
    ///
    /// Used for relationship sub-queries; not subject to the page limit.
    pub async fn collect_ids(
        &self,
        collection: &str,
        filter: Option<Expr>,
    ) -> EngineResult<Vec<String>> {
        let mut scan = Scan::builder().sort(ID_FIELD, SortOrder::Asc);

        if let Some(filter) = filter {
            scan = scan.filter(filter);
        }

        let page = self.store.scan(collection, scan.build()).await?;
        let ids = page
            .documents
            .into_iter()
            .map(|document| document.id)
            .collect::<Vec<_>>();

        debug!(collection, matched = ids.len(), "collected relationship ids");

        Ok(ids)
    }
}
