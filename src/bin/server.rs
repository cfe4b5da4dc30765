//! Coordination server binary.
//!
//! Boots logging, configuration, the database pool (running embedded
//! migrations), the broadcast hub background tasks, and the axum server.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use mes_core::config::ConfigManager;
use mes_core::database::{DatabaseConnection, MIGRATOR};
use mes_core::logging::init_structured_logging;
use mes_core::web::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("Failed to load configuration")?;
    let config = Arc::new(manager.config().clone());
    info!(environment = %manager.environment(), "Configuration loaded");

    let connection = DatabaseConnection::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    MIGRATOR
        .run(connection.pool())
        .await
        .context("Failed to run migrations")?;
    info!("Database ready");

    let state = AppState::build(config.clone(), connection.pool().clone())
        .context("Failed to build application state")?;

    let (_pump, _sweep) = state.hub.spawn_background_tasks();

    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.web.bind_address))?;
    info!(address = %config.web.bind_address, "Coordination server listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
