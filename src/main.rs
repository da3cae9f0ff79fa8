//! Reportes - municipal incident report intake

use anyhow::Result;
use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reportes::{
    api::{self, AppState},
    config::Config,
    db::{ConfigConnector, ConnectionManager, ReconnectPolicy},
    services::{spawn_purge_task, PURGE_INTERVAL},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reportes=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting reportes...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Blocks until the first connection succeeds (or the policy gives up)
    let connector = Arc::new(ConfigConnector::new(config.database.clone()));
    let policy = ReconnectPolicy::from_config(&config.database.reconnect);
    let db = ConnectionManager::establish(connector, policy).await?;
    tracing::info!("Database ready: {:?}", config.database.driver);

    let state = AppState::new(&config, db.clone())?;
    spawn_purge_task(state.sessions.clone(), PURGE_INTERVAL);

    let app = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    let health_interval = config.database.reconnect.health_check_interval();
    tokio::select! {
        served = axum::serve(listener, app).into_future() => served?,
        supervised = db.supervise(health_interval) => {
            // Only returns on an unrecoverable store error
            supervised?;
        }
    }

    Ok(())
}
