use async_trait::async_trait;
use bson::{
    Bson, DateTime as BsonDateTime, Document as BsonDocument, doc,
    de::deserialize_from_bson,
    ser::serialize_to_bson,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use reldoc_core::{
    backend::{StoreBuilder, StoreReader},
    document::Document,
    error::{EngineError, EngineResult},
    query::{QueryVisitor, Scan, ScanPage, SortOrder},
};

use crate::{
    query::{MONGO_CREATED_AT, MONGO_ID, MONGO_UPDATED_AT, MongoQueryTranslator, stored_field},
    sanitizer::ValueSanitizer,
};

/// MongoDB-backed document store.
///
/// Each collection maps to a MongoDB collection of the same (sanitized) name. The
/// document id is stored as `_id` and the timestamps as `_created_at` / `_updated_at`
/// BSON dates; every other key is stored as given, with reserved characters escaped.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<BsonDocument> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    /// Inserts documents into a collection; the engine itself never writes.
    pub async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> EngineResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        self.get_collection(collection)
            .insert_many(
                documents
                    .iter()
                    .map(prepare_document)
                    .collect::<EngineResult<Vec<BsonDocument>>>()?,
            )
            .await
            .map_err(|e| EngineError::Backend(e.to_string()))?;

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

    async fn shutdown(self) -> EngineResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreReader for MongoDbStore {
    async fn fetch_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> EngineResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut found = self
            .get_collection(collection)
            .find(doc! { MONGO_ID: { "$in": ids.clone() } })
            .await
            .map_err(|e| EngineError::Backend(e.to_string()))?
            .try_collect::<Vec<BsonDocument>>()
            .await
            .map_err(|e| EngineError::Backend(e.to_string()))?
            .into_iter()
            .map(|doc| restore_document(collection, doc).map(|doc| (doc.id.clone(), doc)))
            .collect::<EngineResult<HashMap<String, Document>>>()?;

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn scan(&self, collection: &str, scan: Scan) -> EngineResult<ScanPage> {
        let filter = match &scan.filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr)?,
            None => doc! {},
        };

        let mut options = FindOptions::default();

        if let Some(limit) = scan.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if scan.offset > 0 {
            options.skip = Some(scan.offset as u64);
        }
        if !scan.sort.is_empty() {
            let mut sort = BsonDocument::new();
            for key in &scan.sort {
                sort.insert(
                    stored_field(&key.field),
                    match key.order {
                        SortOrder::Asc => 1,
                        SortOrder::Desc => -1,
                    },
                );
            }
            options.sort = Some(sort);
        }

        let total = if scan.count_total {
            Some(
                self.get_collection(collection)
                    .count_documents(filter.clone())
                    .await
                    .map_err(|e| EngineError::Backend(e.to_string()))? as usize
            )
        } else {
            None
        };

        let documents = self
            .get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| EngineError::Backend(e.to_string()))?
            .try_collect::<Vec<BsonDocument>>()
            .await
            .map_err(|e| EngineError::Backend(e.to_string()))?
            .into_iter()
            .map(|doc| restore_document(collection, doc))
            .collect::<EngineResult<Vec<Document>>>()?;

        debug!(collection, returned = documents.len(), ?total, "mongodb scan");

        Ok(ScanPage { documents, total })
    }

    async fn list_collections(&self) -> EngineResult<Vec<String>> {
        let mut names = self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| EngineError::Backend(e.to_string()))?
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .map(|name| ValueSanitizer::restore_string(&name))
            .collect::<Vec<_>>();

        names.sort();

        Ok(names)
    }

    async fn shutdown(self) -> EngineResult<()> {
        self.shutdown().await
    }
}

/// Converts a document into its stored BSON form.
fn prepare_document(document: &Document) -> EngineResult<BsonDocument> {
    let data = serialize_to_bson(&document.data)
        .map_err(|e| EngineError::Serialization(e.to_string()))?;
    let Bson::Document(data) = ValueSanitizer::sanitize_value(&data) else {
        return Err(EngineError::InvalidDocument("Expected document".into()));
    };

    let mut stored = doc! {
        MONGO_ID: document.id.clone(),
        MONGO_CREATED_AT: BsonDateTime::from_chrono(document.created_at),
        MONGO_UPDATED_AT: BsonDateTime::from_chrono(document.updated_at),
    };

    for (key, value) in data {
        stored.insert(key, value);
    }

    Ok(stored)
}

/// Converts a stored BSON document back into a [`Document`].
fn restore_document(collection: &str, mut stored: BsonDocument) -> EngineResult<Document> {
    let id = match stored.remove(MONGO_ID) {
        Some(Bson::String(id)) => id,
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => return Err(EngineError::InvalidDocument("Missing _id".into())),
    };
    let created_at = take_timestamp(&mut stored, MONGO_CREATED_AT);
    let updated_at = take_timestamp(&mut stored, MONGO_UPDATED_AT);
    let data = deserialize_from_bson::<Map<String, Value>>(
        ValueSanitizer::restore_value(&Bson::Document(stored)),
    )
    .map_err(|e| EngineError::Serialization(e.to_string()))?;

    Ok(Document {
        id,
        collection: collection.to_string(),
        data,
        created_at,
        updated_at,
    })
}

fn take_timestamp(stored: &mut BsonDocument, key: &str) -> DateTime<Utc> {
    match stored.remove(key) {
        Some(Bson::DateTime(at)) => at.to_chrono(),
        _ => DateTime::<Utc>::UNIX_EPOCH,
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> EngineResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| EngineError::Initialization(e.to_string()))?,
        )
        .map_err(|e| EngineError::Initialization(e.to_string()))?;

        info!(database = %self.database, "mongodb client ready");

        Ok(MongoDbStore::new(client, self.database))
    }
}
