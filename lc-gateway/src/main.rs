// LC Gateway Service - Letter of Credit lifecycle over HTTP
// Validates requests, drives ledger operations and reports receipts

use lc_core::config::LedgerMode;
use lc_core::metrics::Metrics;
use lc_core::secrets::{EnvSecretStore, InMemorySecretStore, SecretStore};
use lc_core::{ledger, Clock, Config, LcService, SystemClock};
use lc_gateway::{router, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var("LC_LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting LC Gateway Service");

    let config = Config::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    info!(mode = ?config.ledger.mode, "Connecting to ledger");
    let ledger = ledger::connect(&config.ledger, clock.clone())?;

    let metrics = Arc::new(Metrics::new()?);

    // Signing keys
    let env_store = EnvSecretStore::new();
    let mut default_signer = match config.parties.default_signer {
        Some(signer) => Some(signer),
        None => env_store.fallback_address()?,
    };

    let secrets: Arc<dyn SecretStore> =
        if config.ledger.mode == LedgerMode::Memory && default_signer.is_none() {
            let dev_store = InMemorySecretStore::new();
            let signer = dev_store.generate();
            warn!(%signer, "No signing key configured, using an ephemeral development key");
            default_signer = Some(signer);
            Arc::new(dev_store)
        } else {
            Arc::new(env_store)
        };

    match default_signer {
        Some(signer) => info!(%signer, "Default signer"),
        None => warn!("No default signer, requests must set X-Signer-Address"),
    }

    let service = Arc::new(LcService::new(
        ledger,
        secrets,
        &config,
        clock,
        metrics.clone(),
    ));

    let state = AppState {
        service,
        metrics,
        default_signer,
        service_name: config.service_name.clone(),
    };

    let app = router(state, config.max_document_bytes);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on: {}", config.listen_addr);
    info!("   POST /api/lc/create - Issue a new LC");
    info!("   POST /api/lc/approve/:lc_id - Approve by buyer's bank");
    info!("   POST /api/lc/submit-documents/:lc_id - Submit trade documents");
    info!("   POST /api/lc/close/:lc_id - Close an LC");
    info!("   GET  /api/lc/details/:lc_id - LC details");
    info!("   GET  /api/lc/operations/:reference - Operation status");
    info!("   GET  /health - Health check");
    info!("   GET  /metrics - Prometheus metrics");

    axum::serve(listener, app).await?;

    Ok(())
}
