use std::sync::Arc;

use anyhow::{bail, Context};

use crate::config::config;
use crate::database::DatabaseManager;
use crate::services::LogMailer;
use crate::state::AppState;
use crate::storage::LocalDisk;

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let config = config().clone();
    tracing::info!("Starting Blog API in {:?} mode", config.environment);

    if config.lacks_jwt_secret() {
        bail!("JWT_SECRET must be set outside development ({:?})", config.environment);
    }

    let store = DatabaseManager::open(&config.database)
        .await
        .context("failed to open the database")?;
    let files = Arc::new(LocalDisk::new(config.storage.disk.clone(), config.storage.root.clone()));
    let port = port.unwrap_or(config.api.port);

    let state = AppState::new(config, store, files, Arc::new(LogMailer));
    let app = crate::routes::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Blog API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
