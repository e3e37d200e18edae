//! docbridge - ledger document exchange bridge

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docbridge::{
    config::Args,
    db::{DocumentStore, InMemoryDocumentStore, MongoClient, MongoDocumentStore},
    ledger::{LedgerClient, LedgerClientConfig},
    model::UuidAllocator,
    server,
    services::{CalculatorClient, ServiceContext},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("docbridge={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  docbridge - ledger document exchange");
    info!("======================================");
    info!("MSP: {}", args.msp_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Ledger adapter: {}", args.ledger_adapter_url);
    info!("Calculator: {}", args.calculator_url);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // MongoDB is optional in dev mode
    let (store, store_backend): (Arc<dyn DocumentStore>, &'static str) =
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => (Arc::new(MongoDocumentStore::new(&client).await?), "mongodb"),
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                (Arc::new(InMemoryDocumentStore::new()), "memory")
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        };

    let ledger = LedgerClient::new(LedgerClientConfig {
        base_url: args.ledger_adapter_url.clone(),
        timeout_ms: args.request_timeout_ms,
    })?;

    let calculator = CalculatorClient::new(args.calculator_url.as_str(), args.request_timeout_ms)?;

    let ctx = ServiceContext::new(
        store,
        Arc::new(ledger),
        Arc::new(UuidAllocator),
        args.service_config(),
    );

    let state = Arc::new(server::AppState::new(
        args,
        ctx,
        Arc::new(calculator),
        store_backend,
    ));
    server::run(state).await?;

    Ok(())
}
