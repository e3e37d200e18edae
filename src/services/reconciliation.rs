//! Event reconciliation engine
//!
//! Consumes ledger adapter notifications and brings local records in line
//! with what the network holds.
//!
//! ```text
//! STORE:PAYLOADLINK ─▶ list ─▶ fetch each ─▶ key match? ─▶ decode ─▶ persist ─▶ delete remote
//! STORE:SIGNATURE   ─▶ resolve doc/side by key ─▶ fetch registry ─▶ fill open slots ─▶ persist
//! ```
//!
//! Notifications carry storage keys only. Each step runs sequentially; a
//! failure aborts the rest of the batch while already persisted records stay
//! committed. Replays are absorbed by the store's uniqueness on `referenceId`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::codec::{decode, document_signature_keys, payload_key, side_for_key};
use crate::db::DocumentQuery;
use crate::ledger::PrivateDocument;
use crate::lifecycle::{self, usage};
use crate::model::{Document, DocumentState, DocumentType, HistoryAction};
use crate::types::{BridgeError, Result};

use super::signatures::assign_registry_entries;
use super::ServiceContext;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventName {
    #[serde(rename = "STORE:PAYLOADLINK")]
    PayloadLink,
    #[serde(rename = "STORE:SIGNATURE")]
    Signature,
}

impl fmt::Display for LedgerEventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEventName::PayloadLink => f.write_str("STORE:PAYLOADLINK"),
            LedgerEventName::Signature => f.write_str("STORE:SIGNATURE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub storage_key: String,
}

/// Notification pushed by the ledger adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub msp: String,
    pub event_name: LedgerEventName,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub data: EventData,
}

/// Summary of a record created or confirmed by reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
}

impl From<&Document> for ReconciledDocument {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            doc_type: doc.doc_type(),
            reference_id: doc.reference_id.clone().unwrap_or_default(),
            contract_id: doc.contract_id().map(str::to_string),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct ReconciliationService {
    ctx: ServiceContext,
}

impl ReconciliationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn process_event(&self, event: &LedgerEvent) -> Result<Vec<ReconciledDocument>> {
        info!(
            event_name = %event.event_name,
            msp = %event.msp,
            storage_key = %event.data.storage_key,
            "Processing ledger event"
        );

        match event.event_name {
            LedgerEventName::PayloadLink => self.handle_payload_link(&event.data.storage_key).await,
            LedgerEventName::Signature => self.handle_signature(event).await,
        }
    }

    /// Pull every pending payload matching `storage_key` into the local store
    ///
    /// The key names the delivering counterparty, not a single document, so
    /// one notification drains everything that counterparty has delivered.
    /// The notifications raised for the other payloads find them consumed
    /// and return an empty list.
    async fn handle_payload_link(&self, storage_key: &str) -> Result<Vec<ReconciledDocument>> {
        let ids = self.ctx.ledger.list_private_documents().await?;
        debug!(pending = ids.len(), "Listed private documents");

        let mut reconciled = Vec::new();
        for id in ids {
            let remote = match self.ctx.ledger.get_private_document(&id).await {
                Ok(remote) => remote,
                Err(BridgeError::NotFound(_)) => {
                    debug!(id = %id, "Private document consumed meanwhile, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if payload_key(self.ctx.msp_id(), &remote.from_msp) != storage_key {
                continue;
            }

            let summary = self.receive(&remote).await?;

            if let Err(e) = self.ctx.ledger.delete_private_document(&id).await {
                warn!(id = %id, error = %e, "Failed to delete consumed private document");
            }
            reconciled.push(summary);
        }

        if reconciled.is_empty() {
            debug!(storage_key = %storage_key, "No pending payload for storage key");
        }
        Ok(reconciled)
    }

    /// Persist one delivered payload as a RECEIVED record
    async fn receive(&self, remote: &PrivateDocument) -> Result<ReconciledDocument> {
        if let Some(existing) = self.already_received(&remote.reference_id).await? {
            debug!(reference_id = %remote.reference_id, id = %existing.id, "Payload already reconciled");
            return Ok(ReconciledDocument::from(&existing));
        }

        let envelope = decode(&remote.payload)?;
        let parent = match envelope.header.doc_type {
            DocumentType::Contract => None,
            DocumentType::Usage | DocumentType::Settlement => {
                let contract_reference_id =
                    envelope.contract_reference_id.as_deref().ok_or_else(|| {
                        BridgeError::LedgerResponseParsing(format!(
                            "{} payload {} has no contractReferenceId",
                            envelope.header.doc_type, remote.reference_id
                        ))
                    })?;
                let contract = self
                    .ctx
                    .store
                    .find_one(
                        &DocumentQuery::by_reference(contract_reference_id)
                            .of_type(DocumentType::Contract),
                    )
                    .await?;
                Some(contract)
            }
        };

        let mut doc = envelope.into_received(
            self.ctx.ids.allocate(),
            &remote.delivery(),
            parent.as_ref().map(|c| c.id.clone()),
        )?;
        doc.storage_keys = document_signature_keys(&doc);

        let parties = match &parent {
            Some(contract) => contract.as_contract().cloned(),
            None => doc.as_contract().cloned(),
        };
        if let Some(parties) = parties {
            lifecycle::ensure_signature_link(&mut doc, &parties, self.ctx.ids.as_ref());
        }

        let partner = self.pair_incoming_usage(&mut doc).await?;

        let created = match self.ctx.store.create(doc).await {
            Ok(created) => created,
            Err(BridgeError::DuplicateKey(reason)) => {
                debug!(reference_id = %remote.reference_id, reason = %reason, "Concurrent delivery already stored");
                let existing = self
                    .ctx
                    .store
                    .find_one(&DocumentQuery::by_reference(remote.reference_id.as_str()))
                    .await?;
                return Ok(ReconciledDocument::from(&existing));
            }
            Err(e) => return Err(e),
        };

        if let Some(partner) = partner {
            self.ctx.store.replace(&partner).await?;
        }

        info!(
            id = %created.id,
            doc_type = %created.doc_type(),
            reference_id = %remote.reference_id,
            from_msp = %remote.from_msp,
            "Document received"
        );
        Ok(ReconciledDocument::from(&created))
    }

    async fn already_received(&self, reference_id: &str) -> Result<Option<Document>> {
        self.ctx
            .find_optional(&DocumentQuery::by_reference(reference_id))
            .await
    }

    /// Link a received usage with the newest unlinked local usage of the other side
    ///
    /// Returns the partner, updated, for the caller to persist once the
    /// received usage is stored.
    async fn pair_incoming_usage(&self, doc: &mut Document) -> Result<Option<Document>> {
        let Some(query) = usage::incoming_partner_query(doc) else {
            return Ok(None);
        };
        let candidates = self.ctx.store.find_all(&query).await?;
        let Some(partner) = usage::first_unlinked(&candidates) else {
            return Ok(None);
        };

        let mut partner = partner.clone();
        usage::link_partner(doc, &partner.id);
        usage::link_partner(&mut partner, &doc.id);
        debug!(id = %doc.id, partner_usage_id = %partner.id, "Received usage paired");
        Ok(Some(partner))
    }

    /// Link newly registered signatures to their slots
    async fn handle_signature(&self, event: &LedgerEvent) -> Result<Vec<ReconciledDocument>> {
        let storage_key = event.data.storage_key.as_str();
        let Some(mut doc) = self
            .ctx
            .find_optional(&DocumentQuery::by_storage_key(storage_key))
            .await?
        else {
            debug!(storage_key = %storage_key, "No local document for signature key");
            return Ok(Vec::new());
        };

        if doc.as_settlement().is_some() {
            return Ok(Vec::new());
        }

        let Some(side) = side_for_key(&doc, storage_key) else {
            return Ok(Vec::new());
        };

        if doc.state == DocumentState::Sent
            && doc.owner_msp_id() != Some(event.msp.as_str())
        {
            debug!(id = %doc.id, msp = %event.msp, "Ignoring signature event from non-owner");
            return Ok(Vec::new());
        }

        let reference_id = doc.reference_id.clone().unwrap_or_default();
        let Some(msp_id) = doc.side_msp_id(side).map(str::to_string) else {
            return Ok(Vec::new());
        };

        let registry = self.ctx.ledger.get_signatures(&reference_id, &msp_id).await?;
        let filled = match doc.signature_link.as_mut() {
            Some(slots) => assign_registry_entries(slots, side, &registry),
            None => 0,
        };

        if filled > 0 {
            doc.record(HistoryAction::Signed);
            self.ctx.store.replace(&doc).await?;
            info!(id = %doc.id, msp = %msp_id, filled, "Signatures linked");
        }

        Ok(Vec::new())
    }
}
