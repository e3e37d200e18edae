//! Signature link manager
//!
//! Signature slots are reserved on a document when it is first exchanged.
//! The ledger registry is the source of truth for signature material; the
//! document only remembers which registry transaction filled which slot.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::db::DocumentQuery;
use crate::ledger::{SignatureRegistry, SignatureSubmission};
use crate::model::{
    Document, HistoryAction, SignatureLinkEntry, SignaturePayload, SignatureRef, SignatureSide,
    SignatureState, SignatureStatus,
};
use crate::types::{BridgeError, Result};

use super::ServiceContext;

/// Fill open slots of `side` with registry entries not yet linked
///
/// Entries are taken in registry key order and assigned to open slots by
/// ascending index. Returns the number of slots filled.
pub fn assign_registry_entries(
    slots: &mut [SignatureLinkEntry],
    side: SignatureSide,
    registry: &SignatureRegistry,
) -> usize {
    let linked: HashSet<String> = slots
        .iter()
        .filter(|slot| slot.msp == side)
        .filter_map(|slot| slot.tx_id.clone())
        .collect();

    let mut open: Vec<&mut SignatureLinkEntry> = slots
        .iter_mut()
        .filter(|slot| slot.msp == side && !slot.is_signed())
        .collect();
    open.sort_by_key(|slot| slot.index);

    let mut filled = 0;
    let pending = registry.keys().filter(|tx_id| !linked.contains(*tx_id));
    for (slot, tx_id) in open.into_iter().zip(pending) {
        slot.tx_id = Some(tx_id.clone());
        filled += 1;
    }
    filled
}

fn unsigned(doc: &Document, slot: &SignatureLinkEntry) -> SignatureStatus {
    SignatureStatus {
        signature_id: slot.id.clone(),
        document_id: doc.id.clone(),
        msp: slot.msp,
        algorithm: None,
        certificate: None,
        signature: None,
        state: SignatureState::Unsigned,
        blockchain_ref: None,
    }
}

pub struct SignatureService {
    ctx: ServiceContext,
}

impl SignatureService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Status of one signature slot
    pub async fn get_signature(&self, document_id: &str, signature_id: &str) -> Result<SignatureStatus> {
        let doc = self.queryable(document_id).await?;
        let slot = find_slot(&doc, signature_id)?;
        let mut registries = HashMap::new();
        self.status(&doc, slot, &mut registries).await
    }

    /// Status of every slot, in slot order
    pub async fn list_signatures(&self, document_id: &str) -> Result<Vec<SignatureStatus>> {
        let doc = self.queryable(document_id).await?;
        let mut registries = HashMap::new();
        let mut statuses = Vec::new();
        for slot in doc.signature_link.iter().flatten() {
            statuses.push(self.status(&doc, slot, &mut registries).await?);
        }
        Ok(statuses)
    }

    /// Sign one of the local participant's slots
    pub async fn post_signature(
        &self,
        document_id: &str,
        payload: SignaturePayload,
    ) -> Result<SignatureStatus> {
        let mut doc = self
            .ctx
            .store
            .find_one(&DocumentQuery::by_id(document_id))
            .await?;

        if !doc.state.is_exchanged() {
            return Err(BridgeError::UpdateSignaturesNotAllowed(format!(
                "{} {} is {}",
                doc.doc_type(),
                doc.id,
                doc.state
            )));
        }

        let local = self.ctx.msp_id();
        let side = [SignatureSide::FromMsp, SignatureSide::ToMsp]
            .into_iter()
            .find(|side| doc.side_msp_id(*side) == Some(local))
            .ok_or_else(|| {
                BridgeError::UpdateSignaturesNotAllowed(format!(
                    "{} is not a party of {} {}",
                    local,
                    doc.doc_type(),
                    doc.id
                ))
            })?;

        let reference_id = doc.reference_id.clone().ok_or_else(|| {
            BridgeError::Internal(format!("exchanged document {} has no referenceId", doc.id))
        })?;

        let slot_index = pick_slot(&doc, side, payload.signature_id.as_deref())?;

        let receipt = self
            .ctx
            .ledger
            .put_signature(
                &reference_id,
                &SignatureSubmission {
                    algorithm: payload.algorithm.clone(),
                    certificate: payload.certificate.clone(),
                    signature: payload.signature.clone(),
                },
            )
            .await?;

        let slot = match doc.signature_link.as_mut().and_then(|slots| slots.get_mut(slot_index)) {
            Some(slot) => {
                slot.tx_id = Some(receipt.tx_id.clone());
                slot.clone()
            }
            None => {
                return Err(BridgeError::Internal(format!(
                    "signature slot {} vanished from {}",
                    slot_index, doc.id
                )))
            }
        };
        doc.record(HistoryAction::Signed);
        let doc = self.ctx.store.replace(&doc).await?;

        info!(
            document_id = %doc.id,
            signature_id = %slot.id,
            msp = side.as_str(),
            tx_id = %receipt.tx_id,
            "Signature registered"
        );

        Ok(SignatureStatus {
            signature_id: slot.id,
            document_id: doc.id.clone(),
            msp: slot.msp,
            algorithm: Some(payload.algorithm),
            certificate: Some(payload.certificate),
            signature: Some(payload.signature),
            state: SignatureState::Signed,
            blockchain_ref: Some(SignatureRef {
                kind: self.blockchain_type(&doc),
                tx_id: receipt.tx_id,
            }),
        })
    }

    async fn queryable(&self, document_id: &str) -> Result<Document> {
        let doc = self
            .ctx
            .store
            .find_one(&DocumentQuery::by_id(document_id))
            .await?;
        if !doc.state.is_exchanged() {
            return Err(BridgeError::GetSignaturesNotAllowed(format!(
                "{} {} is {}",
                doc.doc_type(),
                doc.id,
                doc.state
            )));
        }
        Ok(doc)
    }

    fn blockchain_type(&self, doc: &Document) -> String {
        doc.blockchain_ref
            .as_ref()
            .map(|r| r.kind.clone())
            .filter(|kind| !kind.is_empty())
            .unwrap_or_else(|| self.ctx.config.blockchain_type.clone())
    }

    async fn status(
        &self,
        doc: &Document,
        slot: &SignatureLinkEntry,
        registries: &mut HashMap<SignatureSide, SignatureRegistry>,
    ) -> Result<SignatureStatus> {
        let Some(tx_id) = slot.tx_id.as_deref() else {
            return Ok(unsigned(doc, slot));
        };

        if !registries.contains_key(&slot.msp) {
            let reference_id = doc.reference_id.as_deref().ok_or_else(|| {
                BridgeError::Internal(format!("exchanged document {} has no referenceId", doc.id))
            })?;
            let msp_id = doc.side_msp_id(slot.msp).ok_or_else(|| {
                BridgeError::Internal(format!(
                    "{} {} has no {} participant",
                    doc.doc_type(),
                    doc.id,
                    slot.msp.as_str()
                ))
            })?;
            let registry = self.ctx.ledger.get_signatures(reference_id, msp_id).await?;
            debug!(reference_id = %reference_id, msp_id = %msp_id, entries = registry.len(), "Fetched signature registry");
            registries.insert(slot.msp, registry);
        }

        let record = registries
            .get(&slot.msp)
            .and_then(|registry| registry.get(tx_id))
            .ok_or_else(|| {
                BridgeError::LedgerResponseParsing(format!(
                    "signature registry has no entry for txId {}",
                    tx_id
                ))
            })?;

        Ok(SignatureStatus {
            signature_id: slot.id.clone(),
            document_id: doc.id.clone(),
            msp: slot.msp,
            algorithm: Some(record.algorithm.clone()),
            certificate: Some(record.certificate.clone()),
            signature: Some(record.signature.clone()),
            state: SignatureState::Signed,
            blockchain_ref: Some(SignatureRef {
                kind: self.blockchain_type(doc),
                tx_id: tx_id.to_string(),
            }),
        })
    }
}

fn find_slot<'a>(doc: &'a Document, signature_id: &str) -> Result<&'a SignatureLinkEntry> {
    doc.signature_link
        .iter()
        .flatten()
        .find(|slot| slot.id == signature_id)
        .ok_or_else(|| BridgeError::SignatureNotFound(signature_id.to_string()))
}

/// Position of the slot to sign: the named one, or the earliest open one of `side`
fn pick_slot(doc: &Document, side: SignatureSide, signature_id: Option<&str>) -> Result<usize> {
    let slots = doc.signature_link.as_deref().unwrap_or_default();

    let position = match signature_id {
        Some(id) => slots
            .iter()
            .position(|slot| slot.id == id)
            .ok_or_else(|| BridgeError::SignatureNotFound(id.to_string()))?,
        None => slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.msp == side && !slot.is_signed())
            .min_by_key(|(_, slot)| slot.index)
            .map(|(position, _)| position)
            .ok_or_else(|| {
                BridgeError::UpdateSignaturesNotAllowed(format!(
                    "no open {} signature slot on {}",
                    side.as_str(),
                    doc.id
                ))
            })?,
    };

    let slot = &slots[position];
    if slot.msp != side {
        return Err(BridgeError::UpdateSignaturesNotAllowed(format!(
            "signature {} belongs to the {} side",
            slot.id,
            slot.msp.as_str()
        )));
    }
    if slot.is_signed() {
        return Err(BridgeError::UpdateSignaturesNotAllowed(format!(
            "signature {} is already signed",
            slot.id
        )));
    }
    Ok(position)
}
