mod api;
mod config;
mod error;
mod ingest;
mod netbox;
mod reconcile;
mod store;
mod store_manager;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::netbox::client::NetboxClient;
use crate::reconcile::Reconciler;
use crate::store::db::InventoryDb;
use crate::store_manager::StoreHandle;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("inventory_syncd=info"))
        )
        .init();

    tracing::info!("Starting inventory-syncd");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/inventory-sync/syncd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let db = InventoryDb::open(&config.store.db_path)?;
    tracing::info!("Opened database at {:?}", config.store.db_path);

    let store = StoreHandle::spawn(db);

    let cancel = CancellationToken::new();

    let netbox = NetboxClient::new(&config.netbox, cancel.clone())?;
    netbox
        .check_status()
        .await
        .with_context(|| format!("Inventory system at {} is not reachable", config.netbox.endpoint))?;
    tracing::info!(endpoint = %config.netbox.endpoint, "Inventory system reachable");

    // Ingestion consumer owns the reconciler and with it the taxonomy cache
    let (ingest_tx, ingest_rx) = mpsc::channel(config.ingest.channel_capacity);
    let consumer_cancel = cancel.clone();
    let consumer_store = store.clone();
    let reconciler = Reconciler::new(store.clone(), netbox);
    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = ingest::run(consumer_store, reconciler, ingest_rx, consumer_cancel).await {
            tracing::error!("Ingest consumer error: {}", e);
        }
    });

    let app = api::routes::router(api::routes::AppState {
        store: store.clone(),
        ingest_tx,
    });

    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();

    let _ = tokio::join!(consumer_handle, server_handle);

    if let Err(e) = store.shutdown().await {
        tracing::error!("Failed to shutdown store: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
