use std::sync::Arc;

use anyhow::Context;
use serde_json::json;

use crate::auth::Role;
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::config;
use crate::database::DatabaseManager;
use crate::services::LogMailer;
use crate::state::AppState;
use crate::storage::MemoryDisk;

/// Seed an account directly with any role; registration always grants Reader.
pub async fn create(
    name: &str,
    email: &str,
    password: &str,
    role: Role,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let config = config().clone();
    if config.database.url.is_none() {
        tracing::warn!("DATABASE_URL not set; the account only lives for this command");
    }

    let store = DatabaseManager::open(&config.database)
        .await
        .context("failed to open the database")?;
    let state = AppState::new(config, store, Arc::new(MemoryDisk::new()), Arc::new(LogMailer));

    let user = state
        .accounts()
        .create_user(name, email, password, role)
        .await
        .context("failed to create user")?;

    output_success(
        output_format,
        &format!("Created {} {} <{}>", role.as_str(), user.name, user.email),
        Some(json!({ "id": user.id, "email": user.email, "role": role.as_str() })),
    )
}
