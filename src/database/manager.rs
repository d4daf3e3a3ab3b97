use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::database::memory::MemoryStore;
use crate::database::postgres::PgStore;
use crate::database::store::Store;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint on the named field
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Idempotent DDL for every table the Postgres store touches.
const SCHEMA: &str = include_str!("../../sql/schema.sql");

/// Builds the store the service runs on
pub struct DatabaseManager;

impl DatabaseManager {
    /// Postgres when a URL is configured, the in-memory store otherwise.
    pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
        match &config.url {
            Some(url) => {
                let pool = Self::connect(url, config).await?;
                Self::apply_schema(&pool).await?;
                Ok(Arc::new(PgStore::new(pool)))
            }
            None => {
                warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }

    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let shown = Self::redacted_url(database_url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(database_url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(format!("{}: {}", shown, e)))?;

        info!("Created database pool for: {}", shown);
        Ok(pool)
    }

    pub async fn apply_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        pool.execute(SCHEMA).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Connection string safe for logs: scheme checked, password masked.
    fn redacted_url(database_url: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(database_url).map_err(|_| DatabaseError::ConfigMissing("valid DATABASE_URL"))?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::ConfigMissing("postgres:// DATABASE_URL"));
        }
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        Ok(url.into())
    }
}
