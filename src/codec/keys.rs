//! Storage key derivation
//!
//! The ledger adapter notifies with storage keys, never with document ids.
//! Both sides derive the same keys from values they already share.

use sha2::{Digest, Sha256};

use crate::model::{Document, SignatureSide};

/// Lowercase hex SHA-256 of `a:b`
pub fn storage_key(a: &str, b: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(a.as_bytes());
    hasher.update(b":");
    hasher.update(b.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key under which `delivering_msp` publishes payloads for `receiving_msp`
pub fn payload_key(receiving_msp: &str, delivering_msp: &str) -> String {
    storage_key(receiving_msp, delivering_msp)
}

/// Key of the signature registry for one participant of a document
pub fn signature_key(reference_id: &str, msp_id: &str) -> String {
    storage_key(reference_id, msp_id)
}

/// Signature keys of an exchanged document, `[fromMsp, toMsp]`
pub fn document_signature_keys(doc: &Document) -> Vec<String> {
    let Some(reference_id) = doc.reference_id.as_deref() else {
        return Vec::new();
    };

    [SignatureSide::FromMsp, SignatureSide::ToMsp]
        .iter()
        .filter_map(|side| doc.side_msp_id(*side))
        .map(|msp| signature_key(reference_id, msp))
        .collect()
}

/// Which side of `doc` a signature key names
pub fn side_for_key(doc: &Document, key: &str) -> Option<SignatureSide> {
    let reference_id = doc.reference_id.as_deref()?;
    [SignatureSide::FromMsp, SignatureSide::ToMsp]
        .into_iter()
        .find(|side| {
            doc.side_msp_id(*side)
                .is_some_and(|msp| signature_key(reference_id, msp) == key)
        })
}
