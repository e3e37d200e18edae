//! Wire encoding: envelopes and storage keys

pub mod envelope;
pub mod keys;

pub use envelope::{decode, encode, Delivery, Envelope, EnvelopeHeader};
pub use keys::{document_signature_keys, payload_key, side_for_key, signature_key, storage_key};
