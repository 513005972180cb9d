mod config;
mod view;
mod event_bridge;
mod api;

use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use chrono::Utc;
use diont::{Diont, InterfaceAddressProvider, UdpTransport};
use crate::config::Config;
use crate::view::history::EventHistory;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("diontd=info,diont=info"))
        )
        .init();

    tracing::info!("Starting diontd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/diont/diontd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Bind the discovery socket
    let transport = UdpTransport::bind(&config.network)
        .with_context(|| format!("Failed to bind discovery port {}", config.network.port))?;

    let diont = Diont::spawn(config.network.clone(), transport, InterfaceAddressProvider);

    // Listeners must be in place before anything can be learned
    let events_rx = event_bridge::subscribe_all(&diont).await?;

    for service in &config.services {
        match diont.announce_service(service.clone()).await {
            Ok(id) => tracing::info!("Announced {}", id),
            Err(e) => tracing::error!("Failed to announce {}: {}", service.name, e),
        }
    }

    let history = Arc::new(RwLock::new(EventHistory::new(config.events.history_len)));
    let (hash_tx, hash_rx) = watch::channel(String::new());
    event_bridge::refresh_hash(&diont, &hash_tx).await?;

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn event bridge task
    let bridge_cancel = cancel.clone();
    let bridge_diont = diont.clone();
    let bridge_history = history.clone();
    let bridge_config = config.announce.clone();
    let bridge_handle = tokio::spawn(async move {
        if let Err(e) = event_bridge::run(
            bridge_diont,
            events_rx,
            bridge_history,
            hash_tx,
            bridge_config,
            bridge_cancel,
        )
        .await
        {
            tracing::error!("Event bridge error: {}", e);
        }
    });

    // Build API router
    let node = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let app_state = api::routes::AppState {
        diont: diont.clone(),
        hash_rx,
        history,
        network: Arc::new(config.network.clone()),
        node,
        started_at: Utc::now(),
    };
    let app = api::routes::router(app_state);

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server with graceful shutdown
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Tell peers our services are going away while the instance still runs
    match diont.service_infos().await {
        Ok(services) => {
            for info in services.into_iter().filter(|info| info.is_our_service) {
                if let Err(e) = diont.renounce_service(info.id()).await {
                    tracing::error!("Failed to renounce {}: {}", info.id(), e);
                }
            }
        }
        Err(e) => tracing::error!("Failed to list own services: {}", e),
    }

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(bridge_handle, server_handle);

    diont.shutdown();

    tracing::info!("Shutdown complete");
    Ok(())
}
