//! Document lifecycle state machine
//!
//! Transition rules and guards per document kind. Everything here is pure:
//! functions take documents (and the parent contract where a rule needs it)
//! and either mutate them in place or explain why the transition is refused.
//! Persistence and ledger calls live in `services::documents`.
//!
//! ```text
//! Contract    DRAFT ──send──▶ SENT            (receiver side: RECEIVED)
//! Usage       DRAFT ──send──▶ SENT            (receiver side: RECEIVED)
//! Settlement  DRAFT ──send──▶ SENT            (receiver side: RECEIVED)
//!               └──reject──▶ DRAFT + tag=REJECTED
//! ```

pub mod contract;
pub mod settlement;
pub mod usage;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{document_signature_keys, Delivery};
use crate::model::{
    allocate_slots, ContractParties, Document, DocumentKind, DocumentState, HistoryAction,
    IdAllocator, MspParty,
};
use crate::types::{BridgeError, Result};

pub use contract::NewContract;
pub use settlement::GenerateMode;
pub use usage::NewUsage;

/// Input for `create_document`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NewDocument {
    Contract(NewContract),
    Usage(NewUsage),
}

/// Editable fields of a DRAFT document; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub from_msp: Option<MspParty>,
    #[serde(default)]
    pub to_msp: Option<MspParty>,
}

/// Only DRAFT documents may be edited
pub fn ensure_editable(doc: &Document) -> Result<()> {
    if doc.state != DocumentState::Draft {
        return Err(BridgeError::ModificationNotAllowed(format!(
            "{} {} is {}",
            doc.doc_type(),
            doc.id,
            doc.state
        )));
    }
    Ok(())
}

/// Apply an edit to a DRAFT document
pub fn apply_update(doc: &mut Document, update: DocumentUpdate) -> Result<()> {
    ensure_editable(doc)?;

    let doc_type = doc.doc_type();
    let touches_parties = update.from_msp.is_some() || update.to_msp.is_some();
    match &mut doc.kind {
        DocumentKind::Contract(parties) => {
            if let Some(from_msp) = update.from_msp {
                parties.from_msp = from_msp;
            }
            if let Some(to_msp) = update.to_msp {
                parties.to_msp = to_msp;
            }
        }
        _ if touches_parties => {
            return Err(BridgeError::BadRequest(format!(
                "fromMsp/toMsp can only be edited on contracts, not on {}",
                doc_type
            )));
        }
        _ => {}
    }

    if let Some(name) = update.name {
        doc.name = name;
    }
    if let Some(version) = update.version {
        doc.version = version;
    }
    if let Some(body) = update.body {
        doc.body = body;
    }

    doc.record(HistoryAction::Updated);
    Ok(())
}

/// Shared send rule for usages and settlements
///
/// The document must be a DRAFT owned by the local participant and its parent
/// contract must already be exchanged.
pub fn check_child_send(doc: &Document, contract: &Document, local_msp: &str) -> Result<()> {
    if doc.state != DocumentState::Draft {
        return Err(BridgeError::SendNotAllowed(format!(
            "{} {} is {}, only DRAFT can be sent",
            doc.doc_type(),
            doc.id,
            doc.state
        )));
    }

    if doc.owner_msp_id() != Some(local_msp) {
        return Err(BridgeError::SendNotAllowed(format!(
            "{} {} is owned by {}, not by {}",
            doc.doc_type(),
            doc.id,
            doc.owner_msp_id().unwrap_or("nobody"),
            local_msp
        )));
    }

    if !contract.state.is_exchanged() {
        return Err(BridgeError::SendNotAllowed(format!(
            "contract {} is {}, it must be SENT or RECEIVED first",
            contract.id, contract.state
        )));
    }

    Ok(())
}

/// Copy the parent contract's ledger reference onto a usage or settlement
pub fn bind_contract_reference(doc: &mut Document, contract: &Document) {
    let reference_id = contract.reference_id.clone();
    match &mut doc.kind {
        DocumentKind::Usage(usage) => usage.contract_reference_id = reference_id,
        DocumentKind::Settlement(settlement) => settlement.contract_reference_id = reference_id,
        DocumentKind::Contract(_) => {}
    }
}

/// Record the ledger reference of a published document and move it to SENT
pub fn mark_sent(
    doc: &mut Document,
    delivery: &Delivery,
    raw_data: String,
    blockchain_type: &str,
) -> Result<()> {
    if doc.reference_id.is_some() {
        return Err(BridgeError::SendNotAllowed(format!(
            "{} {} already has a ledger reference",
            doc.doc_type(),
            doc.id
        )));
    }

    let mut blockchain_ref = delivery.blockchain_ref.clone();
    if blockchain_ref.kind.is_empty() {
        blockchain_ref.kind = blockchain_type.to_string();
    }

    doc.state = DocumentState::Sent;
    doc.reference_id = Some(delivery.reference_id.clone());
    doc.blockchain_ref = Some(blockchain_ref);
    doc.raw_data = Some(raw_data);
    doc.storage_keys = document_signature_keys(doc);
    doc.record(HistoryAction::Sent);
    Ok(())
}

/// Signer counts (fromMsp side, toMsp side) for a contract or usage
///
/// Contracts use their own signer lists. Usages take the counts of the
/// parent contract party standing on the same side as the usage owner.
pub fn signer_counts(doc: &Document, contract: &ContractParties) -> (usize, usize) {
    let from = contract.from_msp.signatures.len();
    let to = contract.to_msp.signatures.len();
    match &doc.kind {
        DocumentKind::Usage(usage) if contract.to_msp.is(&usage.msp_owner) => (to, from),
        _ => (from, to),
    }
}

/// Create the signature slot list once, on first full exchange
///
/// Settlements carry no signature slots.
pub fn ensure_signature_link(doc: &mut Document, contract: &ContractParties, ids: &dyn IdAllocator) {
    if doc.signature_link.is_some() || doc.as_settlement().is_some() {
        return;
    }
    let (from_count, to_count) = signer_counts(doc, contract);
    doc.signature_link = Some(allocate_slots(ids, from_count, to_count));
}
