//! MongoDB client, collection wrapper and document store
//!
//! Pattern adapted from holo-host/rust/util_libs/db/src/mongodb

use async_trait::async_trait;
use bson::{doc, Document as BsonDocument};
use futures_util::{Stream, TryStreamExt};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use super::{DocumentQuery, DocumentStore, SortOrder, DOCUMENT_COLLECTION};
use crate::model::Document;
use crate::types::{BridgeError, Result};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(BsonDocument, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast on an unreachable server instead of hanging startup
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| BridgeError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BridgeError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection with its indexes applied
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
{
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| BridgeError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}

impl IntoIndexes for Document {
    fn into_indices() -> Vec<(BsonDocument, Option<IndexOptions>)> {
        vec![
            (
                doc! { "id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("id_unique".to_string())
                        .build(),
                ),
            ),
            // Only assigned references take part in uniqueness
            (
                doc! { "referenceId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "referenceId": { "$type": "string" } })
                        .name("reference_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "storageKeys": 1 },
                Some(
                    IndexOptions::builder()
                        .name("storage_keys_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "type": 1, "contractId": 1, "state": 1 },
                Some(
                    IndexOptions::builder()
                        .name("contract_children_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn map_write_error(err: mongodb::error::Error, doc: &Document) -> BridgeError {
    if is_duplicate_key(&err) {
        BridgeError::DuplicateKey(format!(
            "id={} referenceId={}",
            doc.id,
            doc.reference_id.as_deref().unwrap_or("-")
        ))
    } else {
        BridgeError::Database(err.to_string())
    }
}

fn sort_spec(sort: SortOrder) -> BsonDocument {
    match sort {
        SortOrder::Oldest => doc! { "_id": 1 },
        SortOrder::Newest => doc! { "_id": -1 },
    }
}

/// Drain a cursor; the first unreadable document fails the whole read
async fn collect_documents<S, E>(cursor: S, query: &DocumentQuery) -> Result<Vec<Document>>
where
    S: Stream<Item = std::result::Result<Document, E>>,
    E: std::fmt::Display,
{
    cursor.try_collect().await.map_err(|e| {
        error!(query = %query.describe(), error = %e, "Error reading documents");
        BridgeError::Database(format!("reading {}: {}", query.describe(), e))
    })
}

/// `DocumentStore` backed by a MongoDB collection
#[derive(Clone)]
pub struct MongoDocumentStore {
    collection: MongoCollection<Document>,
}

impl MongoDocumentStore {
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<Document>(DOCUMENT_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn create(&self, doc: Document) -> Result<Document> {
        self.collection
            .inner()
            .insert_one(&doc)
            .await
            .map_err(|e| map_write_error(e, &doc))?;

        debug!(id = %doc.id, doc_type = %doc.doc_type(), "Document inserted");
        Ok(doc)
    }

    async fn find_one(&self, query: &DocumentQuery) -> Result<Document> {
        self.collection
            .inner()
            .find_one(query.to_filter())
            .sort(sort_spec(query.sort))
            .await?
            .ok_or_else(|| BridgeError::NotFound(query.describe()))
    }

    async fn find_all(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let cursor = self
            .collection
            .inner()
            .find(query.to_filter())
            .sort(sort_spec(query.sort))
            .await?;

        collect_documents(cursor, query).await
    }

    async fn replace(&self, doc: &Document) -> Result<Document> {
        self.collection
            .inner()
            .find_one_and_replace(doc! { "id": doc.id.as_str() }, doc)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_write_error(e, doc))?
            .ok_or_else(|| BridgeError::NotFound(format!("document id={}", doc.id)))
    }

    async fn remove(&self, query: &DocumentQuery) -> Result<Document> {
        self.collection
            .inner()
            .find_one_and_delete(query.to_filter())
            .sort(sort_spec(query.sort))
            .await?
            .ok_or_else(|| BridgeError::NotFound(query.describe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Round trips against a live server live behind docker-compose; these
    // cover the pieces that do not need one.

    #[test]
    fn test_document_indexes() {
        let indices = Document::into_indices();
        let names: Vec<_> = indices
            .iter()
            .filter_map(|(_, opts)| opts.as_ref().and_then(|o| o.name.clone()))
            .collect();
        assert!(names.contains(&"id_unique".to_string()));
        assert!(names.contains(&"reference_id_unique".to_string()));

        let reference = &indices[1].1.as_ref().unwrap();
        assert_eq!(reference.unique, Some(true));
        assert!(reference.partial_filter_expression.is_some());
    }

    fn stored(id: &str) -> Document {
        Document::new(
            id.into(),
            crate::model::DocumentKind::Contract(Default::default()),
            id.into(),
            "1".into(),
            crate::model::DocumentState::Draft,
            serde_json::Value::Null,
            crate::model::HistoryAction::Created,
        )
    }

    #[tokio::test]
    async fn test_unreadable_document_fails_the_read() {
        let query = DocumentQuery::default();

        let cursor = futures_util::stream::iter(vec![
            Ok(stored("a")),
            Err("invalid type: string, expected u32".to_string()),
            Ok(stored("c")),
        ]);
        let result = collect_documents(cursor, &query).await;
        assert!(matches!(result, Err(BridgeError::Database(_))));

        let cursor = futures_util::stream::iter(vec![
            Ok::<_, String>(stored("a")),
            Ok(stored("b")),
        ]);
        let ids: Vec<_> = collect_documents(cursor, &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_sort_spec_uses_insertion_order() {
        assert_eq!(sort_spec(SortOrder::Oldest), doc! { "_id": 1 });
        assert_eq!(sort_spec(SortOrder::Newest), doc! { "_id": -1 });
    }
}
