//! Services layer for docbridge
//!
//! Business operations that coordinate the document store, the ledger
//! adapter and the settlement calculator.
//!
//! ## Services
//!
//! - **Documents**: create / edit / send documents, generate and reject settlements
//! - **Signatures**: query and submit signatures against signature slots
//! - **Reconciliation**: turn ledger notifications into local document changes
//! - **Calculator**: settlement calculation gateway

pub mod calculator;
pub mod documents;
pub mod reconciliation;
pub mod signatures;

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::db::{DocumentQuery, DocumentStore};
use crate::ledger::LedgerAdapter;
use crate::model::{Document, IdAllocator};
use crate::types::{BridgeError, Result};

pub use calculator::{CalculatorClient, SettlementCalculator, StaticCalculator};
pub use documents::{DocumentFilter, DocumentService};
pub use reconciliation::{
    EventData, LedgerEvent, LedgerEventName, ReconciledDocument, ReconciliationService,
};
pub use signatures::SignatureService;

/// Collaborators shared by every service
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn DocumentStore>,
    pub ledger: Arc<dyn LedgerAdapter>,
    pub ids: Arc<dyn IdAllocator>,
    pub config: Arc<ServiceConfig>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: Arc<dyn LedgerAdapter>,
        ids: Arc<dyn IdAllocator>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            ids,
            config: Arc::new(config),
        }
    }

    pub fn msp_id(&self) -> &str {
        &self.config.msp_id
    }

    /// `find_one` that treats NotFound as absence
    pub async fn find_optional(&self, query: &DocumentQuery) -> Result<Option<Document>> {
        match self.store.find_one(query).await {
            Ok(doc) => Ok(Some(doc)),
            Err(BridgeError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
