//! docbridge - ledger document exchange bridge
//!
//! Two organizations exchange contracts, usage reports and settlements
//! through a ledger adapter; each side keeps its own records in a local
//! document store. docbridge runs the document lifecycle, reconciles ledger
//! notifications into local state and links multi-party signatures.
//!
//! ## Layers
//!
//! - **model / codec**: the document record, envelopes and storage keys
//! - **db / ledger**: document store and ledger adapter gateways
//! - **lifecycle**: per-kind transition rules and guards
//! - **services**: documents, signatures and event reconciliation
//! - **server / routes**: event webhook and health probe

pub mod codec;
pub mod config;
pub mod db;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::{Args, ServiceConfig};
pub use server::{run, AppState};
pub use types::{BridgeError, Result};
