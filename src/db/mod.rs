//! Document store gateway
//!
//! `DocumentStore` is the persistence seam: MongoDB in production, an
//! in-memory store for tests and dev mode. Both enforce uniqueness of `id`
//! and of `referenceId`, which is what makes event replay idempotent.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::doc;

use crate::model::{Document, DocumentState, DocumentType};
use crate::types::Result;

pub use memory::InMemoryDocumentStore;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MongoDocumentStore};

/// Collection name for exchanged documents
pub const DOCUMENT_COLLECTION: &str = "documents";

/// Result ordering, by insertion into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Oldest,
    Newest,
}

/// Field-equality query over documents
///
/// Unset fields match anything; `states` matches any of the listed states.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub id: Option<String>,
    pub doc_type: Option<DocumentType>,
    pub states: Vec<DocumentState>,
    pub reference_id: Option<String>,
    pub contract_id: Option<String>,
    pub msp_owner: Option<String>,
    pub msp_receiver: Option<String>,
    pub storage_key: Option<String>,
    pub sort: SortOrder,
}

impl DocumentQuery {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_reference(reference_id: impl Into<String>) -> Self {
        Self {
            reference_id: Some(reference_id.into()),
            ..Default::default()
        }
    }

    pub fn by_storage_key(key: impl Into<String>) -> Self {
        Self {
            storage_key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn of_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }

    pub fn in_states(mut self, states: &[DocumentState]) -> Self {
        self.states = states.to_vec();
        self
    }

    pub fn for_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = Some(contract_id.into());
        self
    }

    pub fn owned_by(mut self, owner: impl Into<String>, receiver: impl Into<String>) -> Self {
        self.msp_owner = Some(owner.into());
        self.msp_receiver = Some(receiver.into());
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Human readable description for NotFound messages
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref id) = self.id {
            parts.push(format!("id={}", id));
        }
        if let Some(doc_type) = self.doc_type {
            parts.push(format!("type={}", doc_type));
        }
        if let Some(ref reference_id) = self.reference_id {
            parts.push(format!("referenceId={}", reference_id));
        }
        if let Some(ref contract_id) = self.contract_id {
            parts.push(format!("contractId={}", contract_id));
        }
        if let Some(ref key) = self.storage_key {
            parts.push(format!("storageKey={}", key));
        }
        if parts.is_empty() {
            "document".to_string()
        } else {
            format!("document {}", parts.join(" "))
        }
    }

    /// Evaluate the query against a document in memory
    pub fn matches(&self, doc: &Document) -> bool {
        let field_is = |f: fn(&Document) -> Option<&str>, want: &Option<String>| {
            want.as_deref().map_or(true, |w| f(doc) == Some(w))
        };

        self.id.as_deref().map_or(true, |id| doc.id == id)
            && self.doc_type.map_or(true, |t| doc.doc_type() == t)
            && (self.states.is_empty() || self.states.contains(&doc.state))
            && self
                .reference_id
                .as_deref()
                .map_or(true, |r| doc.reference_id.as_deref() == Some(r))
            && field_is(Document::contract_id, &self.contract_id)
            && field_is(owner_field, &self.msp_owner)
            && field_is(receiver_field, &self.msp_receiver)
            && self
                .storage_key
                .as_deref()
                .map_or(true, |k| doc.storage_keys.iter().any(|s| s == k))
    }

    /// Equivalent MongoDB filter
    pub fn to_filter(&self) -> bson::Document {
        let mut filter = doc! {};
        if let Some(ref id) = self.id {
            filter.insert("id", id.as_str());
        }
        if let Some(doc_type) = self.doc_type {
            filter.insert("type", doc_type.as_str());
        }
        match self.states.as_slice() {
            [] => {}
            [state] => {
                filter.insert("state", state.as_str());
            }
            states => {
                let states: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
                filter.insert("state", doc! { "$in": states });
            }
        }
        if let Some(ref reference_id) = self.reference_id {
            filter.insert("referenceId", reference_id.as_str());
        }
        if let Some(ref contract_id) = self.contract_id {
            filter.insert("contractId", contract_id.as_str());
        }
        if let Some(ref owner) = self.msp_owner {
            filter.insert("mspOwner", owner.as_str());
        }
        if let Some(ref receiver) = self.msp_receiver {
            filter.insert("mspReceiver", receiver.as_str());
        }
        if let Some(ref key) = self.storage_key {
            filter.insert("storageKeys", key.as_str());
        }
        filter
    }
}

// Only usages and settlements carry mspOwner / mspReceiver fields
fn owner_field(doc: &Document) -> Option<&str> {
    doc.contract_id().and_then(|_| doc.owner_msp_id())
}

fn receiver_field(doc: &Document) -> Option<&str> {
    doc.contract_id()
        .and_then(|_| doc.side_msp_id(crate::model::SignatureSide::ToMsp))
}

/// Persistence operations needed by the lifecycle and reconciliation layers
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; `DuplicateKey` when id or referenceId is taken
    async fn create(&self, doc: Document) -> Result<Document>;

    /// First match in query order; `NotFound` when nothing matches
    async fn find_one(&self, query: &DocumentQuery) -> Result<Document>;

    /// All matches in query order
    async fn find_all(&self, query: &DocumentQuery) -> Result<Vec<Document>>;

    /// Replace the stored document with the same id
    async fn replace(&self, doc: &Document) -> Result<Document>;

    /// Remove and return the first match
    async fn remove(&self, query: &DocumentQuery) -> Result<Document>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentKind, HistoryAction, UsageDetails};

    fn usage(owner: &str, receiver: &str) -> Document {
        Document::new(
            "u-1".into(),
            DocumentKind::Usage(UsageDetails {
                contract_id: "c-1".into(),
                contract_reference_id: None,
                msp_owner: owner.into(),
                msp_receiver: receiver.into(),
                partner_usage_id: None,
            }),
            "u".into(),
            "1".into(),
            DocumentState::Received,
            serde_json::Value::Null,
            HistoryAction::Received,
        )
    }

    #[test]
    fn test_query_matches_in_memory() {
        let doc = usage("B1", "A1");

        assert!(DocumentQuery::default().matches(&doc));
        assert!(DocumentQuery::by_id("u-1").matches(&doc));
        assert!(!DocumentQuery::by_id("u-2").matches(&doc));
        assert!(DocumentQuery::default()
            .of_type(DocumentType::Usage)
            .for_contract("c-1")
            .owned_by("B1", "A1")
            .in_states(&[DocumentState::Sent, DocumentState::Received])
            .matches(&doc));
        assert!(!DocumentQuery::default().owned_by("A1", "B1").matches(&doc));
        assert!(!DocumentQuery::by_reference("r").matches(&doc));
    }

    #[test]
    fn test_query_to_filter() {
        let filter = DocumentQuery::default()
            .of_type(DocumentType::Usage)
            .in_states(&[DocumentState::Received])
            .for_contract("c-1")
            .to_filter();
        assert_eq!(
            filter,
            doc! { "type": "usage", "state": "RECEIVED", "contractId": "c-1" }
        );

        let filter = DocumentQuery::by_storage_key("k")
            .in_states(&[DocumentState::Sent, DocumentState::Received])
            .to_filter();
        assert_eq!(
            filter,
            doc! { "state": { "$in": ["SENT", "RECEIVED"] }, "storageKeys": "k" }
        );
    }
}
