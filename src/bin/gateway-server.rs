//! Gateway Server Binary
//!
//! Loads configuration, wires the cache store, rate limiters, dispatcher and refresh
//! coordinator, and serves the HTTP API until Ctrl-C.

use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use bgg_gateway::config::ConfigManager;
use bgg_gateway::logging::init_structured_logging;
use bgg_gateway::web::{create_app, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load()?;
    info!(
        environment = manager.environment(),
        config = %manager.debug_config(),
        "Starting BGG gateway"
    );

    let config = Arc::new(manager.config().clone());

    let state = AppState::from_config(Arc::clone(&config)).await?;
    info!(
        cache_provider = state.dispatcher.store().provider_name(),
        "Gateway components ready"
    );

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.web.bind_address).await?;
    info!(address = %listener.local_addr()?, "Listening for HTTP requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("Gateway stopped");
    Ok(())
}
