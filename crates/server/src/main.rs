use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::mpsc::Receiver;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crmsync_core::{
    create_event_channel, load_config, validate_config, CorrelationStore, CrmClient, OrderSync,
    ProductCatalog, RestCrmClient, SqliteCorrelationStore, SqliteProductCatalog, SyncEvent,
    SyncEventEnvelope,
};
use crmsync_server::api::create_router;
use crmsync_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the sync event channel
const EVENT_BUFFER_SIZE: usize = 1000;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CRMSYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("CRM endpoint: {}", config.crm.url);
    info!("Database path: {:?}", config.database.path);
    if config.ingress.api_key.is_none() {
        info!("No ingress key configured, order webhooks are unauthenticated");
    }

    // Create SQLite stores
    let correlation: Arc<dyn CorrelationStore> = Arc::new(
        SqliteCorrelationStore::new(&config.database.path)
            .context("Failed to create correlation store")?,
    );
    info!("Correlation store initialized");

    let catalog: Arc<dyn ProductCatalog> = Arc::new(
        SqliteProductCatalog::new(&config.database.path)
            .context("Failed to create product catalog")?,
    );
    info!("Product catalog initialized");

    // Create CRM client
    let crm: Arc<dyn CrmClient> = Arc::new(
        RestCrmClient::new(config.crm.clone()).context("Failed to create CRM client")?,
    );

    // Create event channel and its listener
    let (event_handle, event_receiver) = create_event_channel(EVENT_BUFFER_SIZE);
    let listener_handle = tokio::spawn(log_events(event_receiver));

    let sync = OrderSync::new(
        crm,
        Arc::clone(&catalog),
        Arc::clone(&correlation),
        event_handle,
        config.contact.clone(),
        config.contribution.clone(),
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);

    // Create app state
    let state = Arc::new(AppState::new(config, sync, catalog, correlation));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router owned the last event handle, so the listener drains and exits.
    info!("Server shutting down...");
    let _ = listener_handle.await;
    info!("Event listener stopped");

    Ok(())
}

/// Log every sync event until the channel closes.
async fn log_events(mut receiver: Receiver<SyncEventEnvelope>) {
    while let Some(envelope) = receiver.recv().await {
        let order_id = envelope.event.order().id;
        match &envelope.event {
            SyncEvent::ContactCreated { contact, .. } => {
                info!(order_id, contact_id = contact.id, "Contact created");
            }
            SyncEvent::ContactUpdated { contact, .. } => {
                info!(order_id, contact_id = contact.id, "Contact updated");
            }
            SyncEvent::ContributionCreated { contribution, .. } => {
                info!(order_id, contribution_id = contribution.id, "Contribution created");
            }
            SyncEvent::ContributionStatusUpdated {
                contribution,
                status,
                ..
            } => {
                info!(
                    order_id,
                    contribution_id = contribution.id,
                    status = status.as_str(),
                    "Contribution status updated"
                );
            }
            SyncEvent::PaymentRecorded { payment, .. } => {
                info!(
                    order_id,
                    contribution_id = payment.contribution_id,
                    payment_id = payment.id,
                    "Payment recorded"
                );
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
