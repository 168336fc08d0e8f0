use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consent_ledger::api;
use consent_ledger::config::AppConfig;
use consent_ledger::storage::JsonFileStorage;
use consent_ledger::ConsentLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consent_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting consent ledger");

    let config = AppConfig::load()?;
    info!("Configuration loaded (ledger at {})", config.ledger_path);

    if config.insecure {
        warn!("INSECURE_LEDGER enabled: unsigned consent events will be accepted");
    }

    let storage = Arc::new(JsonFileStorage::new(&config.ledger_path));
    let ledger = Arc::new(ConsentLedger::open(storage, config.ledger_options()).await?);

    let check = ledger.verify().await;
    info!(
        "Chain length {}, valid: {}",
        ledger.len().await,
        check.valid
    );
    if let (Some(index), Some(reason)) = (check.index, &check.reason) {
        warn!("Chain verification failed at block {}: {}", index, reason);
    }

    let app = api::router(ledger);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
