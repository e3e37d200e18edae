//! Envelope codec
//!
//! The envelope is the canonical header + body representation exchanged
//! between organizations. On the wire it is JSON wrapped in standard base64,
//! which is exactly the `payload` string the ledger adapter transports.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{
    BlockchainRef, ContractParties, Document, DocumentKind, DocumentState, DocumentType,
    HistoryAction, MspParty, SettlementDetails, UsageDetails,
};
use crate::types::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeHeader {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_msp: Option<MspParty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_msp: Option<MspParty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub header: EnvelopeHeader,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msp_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msp_receiver: Option<String>,
    /// The encoded string this envelope was decoded from
    #[serde(skip)]
    pub raw_data: Option<String>,
}

/// Ledger delivery metadata stamped onto a received record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from_msp: String,
    pub to_msp: String,
    pub reference_id: String,
    pub blockchain_ref: BlockchainRef,
}

impl Envelope {
    /// Envelope for an outgoing document
    pub fn from_document(doc: &Document) -> Self {
        let mut envelope = Envelope {
            header: EnvelopeHeader {
                doc_type: doc.doc_type(),
                version: doc.version.clone(),
                name: doc.name.clone(),
                from_msp: None,
                to_msp: None,
            },
            body: doc.body.clone(),
            contract_reference_id: None,
            msp_owner: None,
            msp_receiver: None,
            raw_data: None,
        };

        match &doc.kind {
            DocumentKind::Contract(parties) => {
                envelope.header.from_msp = Some(parties.from_msp.clone());
                envelope.header.to_msp = Some(parties.to_msp.clone());
            }
            DocumentKind::Usage(usage) => {
                envelope.contract_reference_id = usage.contract_reference_id.clone();
                envelope.msp_owner = Some(usage.msp_owner.clone());
                envelope.msp_receiver = Some(usage.msp_receiver.clone());
            }
            DocumentKind::Settlement(settlement) => {
                envelope.contract_reference_id = settlement.contract_reference_id.clone();
                envelope.msp_owner = Some(settlement.msp_owner.clone());
                envelope.msp_receiver = Some(settlement.msp_receiver.clone());
            }
        }

        envelope
    }

    /// Build the local RECEIVED record for this envelope
    ///
    /// `contract_id` is the locally resolved parent contract and is required
    /// for usages and settlements.
    pub fn into_received(
        self,
        id: String,
        delivery: &Delivery,
        contract_id: Option<String>,
    ) -> Result<Document> {
        let kind = match self.header.doc_type {
            DocumentType::Contract => {
                let mut from_msp = self.header.from_msp.unwrap_or_default();
                let mut to_msp = self.header.to_msp.unwrap_or_default();
                from_msp.msp_id = Some(delivery.from_msp.clone());
                to_msp.msp_id = Some(delivery.to_msp.clone());
                DocumentKind::Contract(ContractParties { from_msp, to_msp })
            }
            DocumentType::Usage => DocumentKind::Usage(UsageDetails {
                contract_id: require_contract(contract_id, &delivery.reference_id)?,
                contract_reference_id: self.contract_reference_id,
                msp_owner: self.msp_owner.unwrap_or_else(|| delivery.from_msp.clone()),
                msp_receiver: self.msp_receiver.unwrap_or_else(|| delivery.to_msp.clone()),
                partner_usage_id: None,
            }),
            DocumentType::Settlement => DocumentKind::Settlement(SettlementDetails {
                contract_id: require_contract(contract_id, &delivery.reference_id)?,
                contract_reference_id: self.contract_reference_id,
                msp_owner: self.msp_owner.unwrap_or_else(|| delivery.from_msp.clone()),
                msp_receiver: self.msp_receiver.unwrap_or_else(|| delivery.to_msp.clone()),
                usage_id: None,
                tag: None,
                generated_result: None,
            }),
        };

        let mut doc = Document::new(
            id,
            kind,
            self.header.name,
            self.header.version,
            DocumentState::Received,
            self.body,
            HistoryAction::Received,
        );
        doc.reference_id = Some(delivery.reference_id.clone());
        doc.blockchain_ref = Some(delivery.blockchain_ref.clone());
        doc.raw_data = self.raw_data;
        Ok(doc)
    }
}

fn require_contract(contract_id: Option<String>, reference_id: &str) -> Result<String> {
    contract_id.ok_or_else(|| {
        BridgeError::Internal(format!(
            "received document {} has no resolved parent contract",
            reference_id
        ))
    })
}

/// Encode an envelope to its wire string
pub fn encode(envelope: &Envelope) -> Result<String> {
    let json = serde_json::to_vec(envelope)
        .map_err(|e| BridgeError::Internal(format!("envelope serialization failed: {}", e)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decode a wire string, keeping the original as `raw_data`
pub fn decode(raw: &str) -> Result<Envelope> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(raw.trim())?;
    let mut envelope: Envelope = serde_json::from_slice(&bytes)
        .map_err(|e| BridgeError::LedgerResponseParsing(format!("invalid envelope: {}", e)))?;
    envelope.raw_data = Some(raw.to_string());
    Ok(envelope)
}
