//! In-memory document store (tests and dev mode)

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DocumentQuery, DocumentStore, SortOrder};
use crate::model::Document;
use crate::types::{BridgeError, Result};

/// Insertion-ordered store with the same uniqueness rules as MongoDB
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn conflicts(existing: &Document, doc: &Document) -> bool {
    existing.reference_id.is_some() && existing.reference_id == doc.reference_id
}

fn ordered<'a>(documents: &'a [Document], query: &'a DocumentQuery) -> Vec<&'a Document> {
    let mut matched: Vec<&Document> = documents.iter().filter(|d| query.matches(d)).collect();
    if query.sort == SortOrder::Newest {
        matched.reverse();
    }
    matched
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, doc: Document) -> Result<Document> {
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.id == doc.id || conflicts(d, &doc)) {
            return Err(BridgeError::DuplicateKey(format!(
                "id={} referenceId={}",
                doc.id,
                doc.reference_id.as_deref().unwrap_or("-")
            )));
        }
        documents.push(doc.clone());
        Ok(doc)
    }

    async fn find_one(&self, query: &DocumentQuery) -> Result<Document> {
        let documents = self.documents.read().await;
        ordered(&documents, query)
            .first()
            .map(|d| (*d).clone())
            .ok_or_else(|| BridgeError::NotFound(query.describe()))
    }

    async fn find_all(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(ordered(&documents, query).into_iter().cloned().collect())
    }

    async fn replace(&self, doc: &Document) -> Result<Document> {
        let mut documents = self.documents.write().await;
        if documents.iter().any(|d| d.id != doc.id && conflicts(d, doc)) {
            return Err(BridgeError::DuplicateKey(format!(
                "referenceId={}",
                doc.reference_id.as_deref().unwrap_or("-")
            )));
        }
        let slot = documents
            .iter_mut()
            .find(|d| d.id == doc.id)
            .ok_or_else(|| BridgeError::NotFound(format!("document id={}", doc.id)))?;
        *slot = doc.clone();
        Ok(doc.clone())
    }

    async fn remove(&self, query: &DocumentQuery) -> Result<Document> {
        let mut documents = self.documents.write().await;
        let target = ordered(&documents, query)
            .first()
            .map(|d| d.id.clone())
            .ok_or_else(|| BridgeError::NotFound(query.describe()))?;
        let position = documents
            .iter()
            .position(|d| d.id == target)
            .ok_or_else(|| BridgeError::Internal("document vanished during removal".into()))?;
        Ok(documents.remove(position))
    }
}
