use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::app::app;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgStore};
use crate::state::AppState;

pub async fn handle(
    mut config: AppConfig,
    port: Option<u16>,
    skip_migrations: bool,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    if skip_migrations {
        info!("Skipping database migrations");
    } else {
        DatabaseManager::migrate(&pool)
            .await
            .context("failed to apply migrations")?;
    }

    let statement_timeout = Duration::from_millis(config.database.statement_timeout_ms);
    let store = Arc::new(PgStore::new(pool, statement_timeout));

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::new(config, store);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Usage gateway listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
