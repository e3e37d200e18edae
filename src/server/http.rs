//! HTTP server implementation
//!
//! hyper http1 with TokioIo; one task per connection. The server only exposes
//! the ledger event webhook and a liveness probe.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::routes;
use crate::services::{
    DocumentService, ReconciliationService, ServiceContext, SettlementCalculator,
    SignatureService,
};
use crate::types::{BridgeError, Result};

/// Largest ledger notification accepted by the webhook
pub const MAX_EVENT_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Document operations for controllers layered on top
    pub documents: Arc<DocumentService>,
    pub signatures: Arc<SignatureService>,
    /// Ledger notification consumer
    pub reconciliation: Arc<ReconciliationService>,
    /// Backend the document store runs on ("mongodb" or "memory")
    pub store_backend: &'static str,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        ctx: ServiceContext,
        calculator: Arc<dyn SettlementCalculator>,
        store_backend: &'static str,
    ) -> Self {
        Self {
            args,
            documents: Arc::new(DocumentService::new(ctx.clone(), calculator)),
            signatures: Arc::new(SignatureService::new(ctx.clone())),
            reconciliation: Arc::new(ReconciliationService::new(ctx)),
            store_backend,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "docbridge listening on {} as {}",
        state.args.listen, state.args.msp_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - documents are kept in memory when MongoDB is unreachable");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),

        (Method::POST, "/api/v1/events") => {
            match read_body(req.into_body(), MAX_EVENT_BODY_BYTES).await {
                Ok(body) => routes::handle_event(&state.reconciliation, &body).await,
                Err(e) => error_response(e),
            }
        }

        (_, "/health") | (_, "/healthz") | (_, "/api/v1/events") => error_response(
            BridgeError::BadRequest(format!("method not allowed on {}", path)),
        ),

        _ => error_response(BridgeError::NotFound(format!("route {}", path))),
    };

    Ok(response)
}

/// Collect a request body of at most `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(BridgeError::BadRequest(format!(
            "request body exceeds {} bytes",
            limit
        ))),
        Err(e) => Err(BridgeError::BadRequest(format!("failed to read request body: {}", e))),
    }
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Render an error as `{error, message}`
pub fn error_response(err: BridgeError) -> Response<Full<Bytes>> {
    let (status, body) = err.into_status_code_and_body();
    json_response(status, body)
}
