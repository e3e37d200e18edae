//! Configuration for docbridge
//!
//! CLI arguments and environment variable handling using clap. The runtime
//! services only see `ServiceConfig`, built once from `Args` at startup.

use clap::Parser;
use std::net::SocketAddr;

/// docbridge - ledger document exchange bridge
#[derive(Parser, Debug, Clone)]
#[command(name = "docbridge")]
#[command(about = "Exchanges contracts, usages and settlements over a ledger adapter")]
pub struct Args {
    /// Address the event webhook listens on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Network identity (MSP id) of the local organization
    #[arg(long, env = "MSP_ID")]
    pub msp_id: String,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "docbridge")]
    pub mongodb_db: String,

    /// Base URL of the ledger adapter
    #[arg(long, env = "LEDGER_ADAPTER_URL", default_value = "http://localhost:8081")]
    pub ledger_adapter_url: String,

    /// Base URL of the settlement calculator
    #[arg(long, env = "CALCULATOR_URL", default_value = "http://localhost:8082")]
    pub calculator_url: String,

    /// Outbound request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Ledger type stamped on blockchain references
    #[arg(long, env = "BLOCKCHAIN_TYPE", default_value = "hlf")]
    pub blockchain_type: String,

    /// Enable development mode (falls back to an in-memory store without MongoDB)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.msp_id.trim().is_empty() {
            return Err("MSP_ID must not be empty".to_string());
        }

        for (name, url) in [
            ("LEDGER_ADAPTER_URL", &self.ledger_adapter_url),
            ("CALCULATOR_URL", &self.calculator_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            msp_id: self.msp_id.trim().to_string(),
            blockchain_type: self.blockchain_type.clone(),
        }
    }
}

/// Process-wide settings shared by the document services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Local participant
    pub msp_id: String,
    /// Ledger type reported in `blockchainRef.type` when the adapter omits it
    pub blockchain_type: String,
}

impl ServiceConfig {
    pub fn new(msp_id: impl Into<String>) -> Self {
        Self {
            msp_id: msp_id.into(),
            blockchain_type: "hlf".to_string(),
        }
    }
}
