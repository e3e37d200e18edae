//! Shared data model
//!
//! Contracts, usages and settlements are one `Document` type with a
//! kind-specific payload; signature slots and id allocation live alongside.

pub mod document;
pub mod ids;
pub mod signature;

pub use document::{
    BlockchainRef, ContractParties, Document, DocumentKind, DocumentState, DocumentType,
    HistoryAction, HistoryEntry, MspParty, SettlementDetails, SettlementTag, Signer,
    UsageDetails,
};
pub use ids::{IdAllocator, UuidAllocator};
pub use signature::{
    allocate_slots, SignatureLinkEntry, SignaturePayload, SignatureRef, SignatureSide,
    SignatureState, SignatureStatus,
};
