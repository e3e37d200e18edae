//! Ledger event webhook
//!
//! `POST /api/v1/events` - the ledger adapter pushes `STORE:PAYLOADLINK` and
//! `STORE:SIGNATURE` notifications here. The response is the array of
//! documents the notification created (empty for signature events).

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::warn;

use crate::server::{error_response, json_response};
use crate::services::{LedgerEvent, ReconciliationService};
use crate::types::BridgeError;

/// Decode a notification body and run it through reconciliation
pub async fn handle_event(engine: &ReconciliationService, body: &[u8]) -> Response<Full<Bytes>> {
    let event: LedgerEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => return error_response(BridgeError::BadRequest(format!("invalid event: {}", e))),
    };

    match engine.process_event(&event).await {
        Ok(reconciled) => match serde_json::to_string(&reconciled) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => error_response(BridgeError::Internal(e.to_string())),
        },
        Err(e) => {
            warn!(
                event_name = %event.event_name,
                storage_key = %event.data.storage_key,
                error = %e,
                "Ledger event failed"
            );
            error_response(e)
        }
    }
}
