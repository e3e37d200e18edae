//! Ledger adapter wire types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::codec::Delivery;
use crate::model::BlockchainRef;

/// Transaction reference as the adapter reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTxRef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(default)]
    pub timestamp: String,
}

impl From<LedgerTxRef> for BlockchainRef {
    fn from(tx: LedgerTxRef) -> Self {
        BlockchainRef {
            kind: tx.kind,
            tx_id: tx.tx_id,
            timestamp: tx.timestamp,
        }
    }
}

/// A private document held by the adapter for this organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateDocument {
    #[serde(rename = "fromMSP")]
    pub from_msp: String,
    #[serde(rename = "toMSP")]
    pub to_msp: String,
    /// Encoded envelope (base64)
    pub payload: String,
    #[serde(rename = "blockchainRef")]
    pub blockchain_ref: LedgerTxRef,
    #[serde(rename = "referenceID")]
    pub reference_id: String,
}

impl PrivateDocument {
    pub fn delivery(&self) -> Delivery {
        Delivery {
            from_msp: self.from_msp.clone(),
            to_msp: self.to_msp.clone(),
            reference_id: self.reference_id.clone(),
            blockchain_ref: self.blockchain_ref.clone().into(),
        }
    }
}

/// Body of `POST /private-documents`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrivateDocument {
    #[serde(rename = "toMSP")]
    pub to_msp: String,
    pub payload: String,
}

/// One registered signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub algorithm: String,
    pub certificate: String,
    pub signature: String,
}

/// Registry for one (referenceId, mspId): txId → signature
pub type SignatureRegistry = BTreeMap<String, SignatureRecord>;

/// Body of `PUT /signatures/{referenceId}`
pub type SignatureSubmission = SignatureRecord;

/// Response of `PUT /signatures/{referenceId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureReceipt {
    #[serde(rename = "txID")]
    pub tx_id: String,
}
