//! Health check endpoint
//!
//! `/health`, `/healthz` - liveness probe. Always 200 while the process is
//! serving; the body reports build metadata and which store backend is in use.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::{json_response, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    /// Local participant
    pub msp_id: String,
    /// "mongodb" or "memory"
    pub store: &'static str,
    pub uptime: u64,
    pub timestamp: String,
}

pub fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        msp_id: state.args.msp_id.clone(),
        store: state.store_backend,
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Handle liveness probe
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(&build_health_response(state))
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());
    json_response(StatusCode::OK, body)
}
