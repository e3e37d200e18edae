//! HTTP server for the ledger event webhook

pub mod http;

pub use http::{error_response, json_response, run, AppState};
