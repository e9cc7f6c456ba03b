// src/database.rs
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{error, info};

use crate::{config::DatabaseConfig, errors::TrackerError};

pub mod history;
pub mod state;

pub use history::HistoryStore;
pub use state::StateStore;

/// Handle to the telemetry store
///
/// Owns the connection pool. Cloning is cheap and shares the pool, so the
/// handle is passed explicitly to whoever needs it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Wrap an existing pool and apply pending migrations
    pub async fn new(pool: SqlitePool) -> Result<Self, TrackerError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Open the database described by the configuration
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Self::from_url(&config.url, config.max_connections).await
    }

    /// Open or create the database with optimized settings
    pub async fn from_url(url: &str, max_connections: u32) -> Result<Self, TrackerError> {
        info!("Opening database at {}", url);
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| TrackerError::DatabaseConnectionError(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .busy_timeout(Duration::from_secs(5));

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if url.contains(":memory:") || url.contains("mode=memory") {
            // Every connection to an in-memory database sees its own database,
            // and the data is gone once that connection closes
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to open database: {}", e);
                TrackerError::DatabaseConnectionError(e.to_string())
            })?;

        Self::new(pool).await
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::new(self.pool.clone())
    }

    pub fn state(&self) -> StateStore {
        StateStore::new(self.pool.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections, waiting for in-flight operations to finish
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }
}
