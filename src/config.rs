//! Application configuration

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::TrackerError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Where telemetry comes from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Http,
    Mock,
}

/// What a cycle does when the source cannot be reached
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnSourceFailure {
    /// The cycle fails with `SourceUnavailable`
    Fail,
    /// The cycle completes degraded, writing nothing
    Skip,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub mode: SourceMode,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Full fleet snapshot URL, overrides the one derived from `api_key`
    pub export_url: Option<String>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub timeout: Duration,
    pub on_failure: OnSourceFailure,
    /// Number of vessels generated in mock mode
    pub mock_vessels: usize,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub interval: Duration,
    pub run_on_start: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("database.url", "sqlite://data/vessels.db")?
            .set_default("database.max_connections", 5)?
            .set_default("source.mode", "mock")?
            .set_default("source.base_url", "https://services.marinetraffic.com/api")?
            .set_default("source.timeout", 15)?
            .set_default("source.on_failure", "fail")?
            .set_default("source.mock_vessels", 5)?
            .set_default("schedule.interval", 7200)?
            .set_default("schedule.run_on_start", true)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("VESSELTRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl DatabaseConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.validate_url()?;
        if self.max_connections == 0 {
            return Err(TrackerError::ConfigurationError {
                message: "Database max_connections must be greater than zero".to_string(),
            });
        }
        if let Some(parent) = self.file_path().and_then(Path::parent) {
            self.ensure_directory_exists(parent)?;
        }
        Ok(())
    }

    fn validate_url(&self) -> Result<(), TrackerError> {
        if !self.url.starts_with("sqlite:") {
            return Err(TrackerError::ConfigurationError {
                message: format!("Database url must be an sqlite url, got {:?}", self.url),
            });
        }
        if self.file_path().is_none() && !self.url.contains(":memory:") {
            return Err(TrackerError::ConfigurationError {
                message: "Database path cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Database file path, None for in-memory databases
    fn file_path(&self) -> Option<&Path> {
        let path = self
            .url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            None
        } else {
            Some(Path::new(path))
        }
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), TrackerError> {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            warn!("Database directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| TrackerError::ConfigurationError {
                message: format!("Could not create database directory: {}", e),
            })?;
        }
        Ok(())
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.timeout.is_zero() {
            return Err(TrackerError::ConfigurationError {
                message: "Source timeout must be greater than zero".to_string(),
            });
        }
        match self.mode {
            SourceMode::Http if self.api_key.is_none() && self.export_url.is_none() => {
                Err(TrackerError::ConfigurationError {
                    message: "HTTP source needs an api_key or an export_url".to_string(),
                })
            }
            SourceMode::Mock if self.mock_vessels == 0 => Err(TrackerError::ConfigurationError {
                message: "Mock source needs at least one vessel".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.interval.is_zero() {
            return Err(TrackerError::ConfigurationError {
                message: "Schedule interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn source_config(mode: SourceMode) -> SourceConfig {
        SourceConfig {
            mode,
            base_url: "https://example.com/api".to_string(),
            api_key: None,
            export_url: None,
            timeout: Duration::from_secs(10),
            on_failure: OnSourceFailure::Fail,
            mock_vessels: 5,
        }
    }

    #[test]
    fn test_load_config() {
        env::set_var("VESSELTRACKER__DATABASE__URL", "sqlite:///tmp/test.db");
        env::set_var("VESSELTRACKER__SOURCE__MODE", "http");
        env::set_var("VESSELTRACKER__SOURCE__API_KEY", "secret");
        env::set_var("VESSELTRACKER__SOURCE__ON_FAILURE", "skip");
        env::set_var("VESSELTRACKER__SCHEDULE__INTERVAL", "60");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.database.url, "sqlite:///tmp/test.db");
        assert_eq!(config.source.mode, SourceMode::Http);
        assert_eq!(config.source.api_key.as_deref(), Some("secret"));
        assert_eq!(config.source.on_failure, OnSourceFailure::Skip);
        assert_eq!(config.source.timeout, Duration::from_secs(15));
        assert_eq!(config.schedule.interval, Duration::from_secs(60));
        assert!(config.source.validate().is_ok());
        assert!(config.schedule.validate().is_ok());
    }

    #[test]
    fn test_database_config_validate() {
        let temp_dir = tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("nested/test.db").display()),
            max_connections: 5,
        };

        assert!(config.validate().is_ok());
        assert!(temp_dir.path().join("nested").exists());
    }

    #[test]
    fn test_database_config_validate_memory() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_config_validate_invalid_url() {
        for url in ["", "sqlite://", "postgres://localhost/vessels"] {
            let config = DatabaseConfig {
                url: url.to_string(),
                max_connections: 5,
            };
            assert!(config.validate().is_err(), "{:?} should be rejected", url);
        }
    }

    #[test]
    fn test_source_config_validate() {
        assert!(source_config(SourceMode::Mock).validate().is_ok());
        assert!(source_config(SourceMode::Http).validate().is_err());

        let mut config = source_config(SourceMode::Http);
        config.export_url = Some("https://example.com/export".to_string());
        assert!(config.validate().is_ok());

        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schedule_config_validate_invalid_interval() {
        let config = ScheduleConfig {
            interval: Duration::from_secs(0),
            run_on_start: false,
        };

        assert!(config.validate().is_err());
    }
}
