//! Error types for docbridge
//!
//! One error enum for the whole crate; every variant maps onto an HTTP status
//! so the webhook (and any controller layered on top) can render it directly.

use hyper::StatusCode;

/// Main error type for docbridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("signature id doesn't exist: {0}")]
    SignatureNotFound(String),

    #[error("Modification not allowed: {0}")]
    ModificationNotAllowed(String),

    #[error("Send not allowed: {0}")]
    SendNotAllowed(String),

    #[error("Get signatures not allowed: {0}")]
    GetSignaturesNotAllowed(String),

    #[error("Update signatures not allowed: {0}")]
    UpdateSignaturesNotAllowed(String),

    #[error("Ledger response parsing error: {0}")]
    LedgerResponseParsing(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Calculator error: {0}")]
    Calculator(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::SignatureNotFound(_) => StatusCode::NOT_FOUND,
            Self::ModificationNotAllowed(_)
            | Self::SendNotAllowed(_)
            | Self::GetSignaturesNotAllowed(_)
            | Self::UpdateSignaturesNotAllowed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LedgerResponseParsing(_) => StatusCode::BAD_GATEWAY,
            Self::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DuplicateKey(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Calculator(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error name, used in JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::SignatureNotFound(_) => "SignatureNotFound",
            Self::ModificationNotAllowed(_) => "ModificationNotAllowed",
            Self::SendNotAllowed(_) => "SendNotAllowed",
            Self::GetSignaturesNotAllowed(_) => "GetSignaturesNotAllowed",
            Self::UpdateSignaturesNotAllowed(_) => "UpdateSignaturesNotAllowed",
            Self::LedgerResponseParsing(_) => "LedgerResponseParsingError",
            Self::LedgerUnavailable(_) => "LedgerUnavailable",
            Self::DuplicateKey(_) => "DuplicateKey",
            Self::Database(_) => "DatabaseError",
            Self::BadRequest(_) => "BadRequest",
            Self::Calculator(_) => "CalculatorError",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        })
        .to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<base64::DecodeError> for BridgeError {
    fn from(err: base64::DecodeError) -> Self {
        Self::LedgerResponseParsing(format!("base64 error: {}", err))
    }
}

impl From<mongodb::error::Error> for BridgeError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for BridgeError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON serialization failed: {}", err))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::LedgerResponseParsing(err.to_string())
        } else {
            Self::LedgerUnavailable(err.to_string())
        }
    }
}

/// Result type alias for docbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
