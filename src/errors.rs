//! Errors for the vessel tracker
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Telemetry source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to write {store}: {message}")]
    StoreWriteFailed {
        store: &'static str,
        message: String,
    },

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Invalid vessel id: {0:?}")]
    InvalidVesselId(String),

    #[error("Database connection error: {0}")]
    DatabaseConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl TrackerError {
    /// Wrap a store error raised while writing ingested telemetry
    pub(crate) fn write_failed(store: &'static str, err: TrackerError) -> Self {
        TrackerError::StoreWriteFailed {
            store,
            message: err.to_string(),
        }
    }
}
