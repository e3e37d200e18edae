//! In-memory ledger network (tests and local development)
//!
//! One `InMemoryNetwork` is shared by every participant; each participant
//! talks to it through its own `InMemoryLedger` view, the way each
//! organization talks to its own adapter in a real deployment.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{
    LedgerTxRef, NewPrivateDocument, PrivateDocument, SignatureReceipt, SignatureRegistry,
    SignatureSubmission,
};
use super::LedgerAdapter;
use crate::types::{BridgeError, Result};

#[derive(Default)]
struct NetworkState {
    /// Pending private documents per recipient, in arrival order
    inboxes: HashMap<String, Vec<(String, PrivateDocument)>>,
    /// (referenceId, mspId) → registry
    signatures: HashMap<(String, String), SignatureRegistry>,
}

/// Shared ledger state
#[derive(Default)]
pub struct InMemoryNetwork {
    state: RwLock<NetworkState>,
    tx_counter: AtomicU64,
    fail_deletes: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adapter view for one participant
    pub fn participant(self: &Arc<Self>, msp_id: impl Into<String>) -> InMemoryLedger {
        InMemoryLedger {
            network: Arc::clone(self),
            msp_id: msp_id.into(),
        }
    }

    /// Make every DELETE fail (the documents stay in the inbox)
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail as a transport error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn next_tx(&self) -> LedgerTxRef {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        LedgerTxRef {
            kind: "hlf".to_string(),
            tx_id: format!("tx-{:06}", n),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BridgeError::LedgerUnavailable("in-memory network is down".into()));
        }
        Ok(())
    }

    /// Drop a raw private document into a participant's inbox
    pub async fn deliver(&self, to_msp: &str, id: impl Into<String>, document: PrivateDocument) {
        self.state
            .write()
            .await
            .inboxes
            .entry(to_msp.to_string())
            .or_default()
            .push((id.into(), document));
    }

    /// Register a signature directly, as another participant's adapter would
    pub async fn register_signature(
        &self,
        reference_id: &str,
        msp_id: &str,
        record: SignatureSubmission,
    ) -> String {
        let tx = self.next_tx();
        self.state
            .write()
            .await
            .signatures
            .entry((reference_id.to_string(), msp_id.to_string()))
            .or_default()
            .insert(tx.tx_id.clone(), record);
        tx.tx_id
    }

    /// Number of pending documents for a participant
    pub async fn pending(&self, msp_id: &str) -> usize {
        self.state
            .read()
            .await
            .inboxes
            .get(msp_id)
            .map_or(0, Vec::len)
    }
}

/// One participant's adapter
#[derive(Clone)]
pub struct InMemoryLedger {
    network: Arc<InMemoryNetwork>,
    msp_id: String,
}

impl InMemoryLedger {
    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn network(&self) -> &Arc<InMemoryNetwork> {
        &self.network
    }
}

#[async_trait]
impl LedgerAdapter for InMemoryLedger {
    async fn list_private_documents(&self) -> Result<Vec<String>> {
        self.network.check_available()?;
        let state = self.network.state.read().await;
        Ok(state
            .inboxes
            .get(&self.msp_id)
            .map(|inbox| inbox.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_private_document(&self, id: &str) -> Result<PrivateDocument> {
        self.network.check_available()?;
        let state = self.network.state.read().await;
        state
            .inboxes
            .get(&self.msp_id)
            .and_then(|inbox| inbox.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| BridgeError::NotFound(format!("ledger resource /private-documents/{}", id)))
    }

    async fn delete_private_document(&self, id: &str) -> Result<()> {
        self.network.check_available()?;
        if self.network.fail_deletes.load(Ordering::SeqCst) {
            return Err(BridgeError::LedgerUnavailable(format!("delete of {} refused", id)));
        }
        let mut state = self.network.state.write().await;
        let inbox = state.inboxes.entry(self.msp_id.clone()).or_default();
        let before = inbox.len();
        inbox.retain(|(doc_id, _)| doc_id != id);
        if inbox.len() == before {
            return Err(BridgeError::NotFound(format!("ledger resource /private-documents/{}", id)));
        }
        Ok(())
    }

    async fn publish_private_document(
        &self,
        document: &NewPrivateDocument,
    ) -> Result<PrivateDocument> {
        self.network.check_available()?;
        let reference_id = Uuid::new_v4().to_string();
        let published = PrivateDocument {
            from_msp: self.msp_id.clone(),
            to_msp: document.to_msp.clone(),
            payload: document.payload.clone(),
            blockchain_ref: self.network.next_tx(),
            reference_id: reference_id.clone(),
        };

        self.network
            .deliver(&document.to_msp, reference_id, published.clone())
            .await;
        Ok(published)
    }

    async fn get_signatures(&self, reference_id: &str, msp_id: &str) -> Result<SignatureRegistry> {
        self.network.check_available()?;
        let state = self.network.state.read().await;
        Ok(state
            .signatures
            .get(&(reference_id.to_string(), msp_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn put_signature(
        &self,
        reference_id: &str,
        submission: &SignatureSubmission,
    ) -> Result<SignatureReceipt> {
        self.network.check_available()?;
        let tx_id = self
            .network
            .register_signature(reference_id, &self.msp_id, submission.clone())
            .await;
        Ok(SignatureReceipt { tx_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_lands_in_recipient_inbox() {
        let network = InMemoryNetwork::new();
        let a = network.participant("A1");
        let b = network.participant("B1");

        let published = a
            .publish_private_document(&NewPrivateDocument {
                to_msp: "B1".into(),
                payload: "e30=".into(),
            })
            .await
            .unwrap();

        assert!(a.list_private_documents().await.unwrap().is_empty());
        let ids = b.list_private_documents().await.unwrap();
        assert_eq!(ids, vec![published.reference_id.clone()]);

        let fetched = b.get_private_document(&ids[0]).await.unwrap();
        assert_eq!(fetched.from_msp, "A1");

        b.delete_private_document(&ids[0]).await.unwrap();
        assert_eq!(network.pending("B1").await, 0);
    }

    #[tokio::test]
    async fn test_signatures_are_registered_per_participant() {
        let network = InMemoryNetwork::new();
        let a = network.participant("A1");
        let record = SignatureSubmission {
            algorithm: "ecdsa".into(),
            certificate: "cert".into(),
            signature: "sig".into(),
        };

        let receipt = a.put_signature("ref-1", &record).await.unwrap();
        let registry = a.get_signatures("ref-1", "A1").await.unwrap();
        assert_eq!(registry.get(&receipt.tx_id), Some(&record));
        assert!(a.get_signatures("ref-1", "B1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_network() {
        let network = InMemoryNetwork::new();
        network.set_unavailable(true);
        let result = network.participant("A1").list_private_documents().await;
        assert!(matches!(result, Err(BridgeError::LedgerUnavailable(_))));
    }
}
