//! Ledger adapter gateway
//!
//! The adapter brokers private document transfer and the signature registry
//! over the ledger network. `LedgerClient` talks to the real adapter over
//! HTTP; `InMemoryNetwork` stands in for it in tests.

pub mod client;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::types::Result;

pub use client::{LedgerClient, LedgerClientConfig};
pub use memory::{InMemoryLedger, InMemoryNetwork};
pub use types::{
    LedgerTxRef, NewPrivateDocument, PrivateDocument, SignatureReceipt, SignatureRecord,
    SignatureRegistry, SignatureSubmission,
};

/// Operations offered by the ledger adapter to one organization
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Ids of private documents currently held for this organization, in arrival order
    async fn list_private_documents(&self) -> Result<Vec<String>>;

    async fn get_private_document(&self, id: &str) -> Result<PrivateDocument>;

    async fn delete_private_document(&self, id: &str) -> Result<()>;

    /// Publish a payload to another organization; returns the new ledger reference
    async fn publish_private_document(&self, document: &NewPrivateDocument)
        -> Result<PrivateDocument>;

    async fn get_signatures(&self, reference_id: &str, msp_id: &str) -> Result<SignatureRegistry>;

    /// Register a signature under `reference_id` for the calling organization
    async fn put_signature(
        &self,
        reference_id: &str,
        submission: &SignatureSubmission,
    ) -> Result<SignatureReceipt>;
}
