//! Signature slots and their wire shapes

use serde::{Deserialize, Serialize};

use super::ids::IdAllocator;

/// Which side of the document a slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureSide {
    #[serde(rename = "fromMsp")]
    FromMsp,
    #[serde(rename = "toMsp")]
    ToMsp,
}

impl SignatureSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureSide::FromMsp => "fromMsp",
            SignatureSide::ToMsp => "toMsp",
        }
    }
}

/// One reserved signature position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureLinkEntry {
    pub id: String,
    pub msp: SignatureSide,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

impl SignatureLinkEntry {
    pub fn is_signed(&self) -> bool {
        self.tx_id.is_some()
    }
}

/// Allocate `from_count` fromMsp slots followed by `to_count` toMsp slots
pub fn allocate_slots(
    ids: &dyn IdAllocator,
    from_count: usize,
    to_count: usize,
) -> Vec<SignatureLinkEntry> {
    let side = |msp: SignatureSide, count: usize| {
        (0..count).map(move |index| (msp, index as u32))
    };

    side(SignatureSide::FromMsp, from_count)
        .chain(side(SignatureSide::ToMsp, to_count))
        .map(|(msp, index)| SignatureLinkEntry {
            id: ids.allocate(),
            msp,
            index,
            tx_id: None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureState {
    Unsigned,
    Signed,
}

/// Ledger location of a registered signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub tx_id: String,
}

/// Status of one slot as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub signature_id: String,
    pub document_id: String,
    pub msp: SignatureSide,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub state: SignatureState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_ref: Option<SignatureRef>,
}

/// Signature submitted by a local signer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    /// Slot to fill; the earliest open slot of the caller's side when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<String>,
    pub signature: String,
    pub certificate: String,
    pub algorithm: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::UuidAllocator;

    #[test]
    fn test_allocate_slots_orders_sides_then_indices() {
        let slots = allocate_slots(&UuidAllocator, 2, 3);

        assert_eq!(slots.len(), 5);
        let layout: Vec<_> = slots.iter().map(|s| (s.msp, s.index)).collect();
        assert_eq!(
            layout,
            vec![
                (SignatureSide::FromMsp, 0),
                (SignatureSide::FromMsp, 1),
                (SignatureSide::ToMsp, 0),
                (SignatureSide::ToMsp, 1),
                (SignatureSide::ToMsp, 2),
            ]
        );
        assert!(slots.iter().all(|s| !s.is_signed()));
    }

    #[test]
    fn test_slot_side_wire_names() {
        let slot = SignatureLinkEntry {
            id: "s".into(),
            msp: SignatureSide::ToMsp,
            index: 0,
            tx_id: Some("tx".into()),
        };
        let value = serde_json::to_value(&slot).unwrap();
        assert_eq!(value["msp"], "toMsp");
        assert_eq!(value["txId"], "tx");
    }
}
