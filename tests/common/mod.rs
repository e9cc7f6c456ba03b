#![allow(dead_code)]

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use vessel_tracker::{
    database::Database,
    errors::TrackerError,
    models::{PositionReport, VesselId},
    normalize::RawReport,
    source::{FetchRequest, TelemetrySource},
};

pub async fn setup_test_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    Database::new(pool).await.expect("Failed to run migrations")
}

pub fn vessel(mmsi: &str) -> VesselId {
    VesselId::try_from(mmsi).unwrap()
}

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

pub fn position(mmsi: &str, minute: i64) -> PositionReport {
    PositionReport {
        mmsi: vessel(mmsi),
        lat: 60.0 + minute as f64 / 1000.0,
        lon: 24.9,
        speed: Some(12),
        heading: Some(90),
        course: Some(91),
        status: Some(0),
        timestamp: at(minute),
    }
}

/// Source that always answers with the same payload
pub struct StaticSource(pub Vec<RawReport>);

impl TelemetrySource for StaticSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawReport>, TrackerError> {
        Ok(self.0.clone())
    }
}

/// Source that is never reachable
pub struct FailingSource;

impl TelemetrySource for FailingSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawReport>, TrackerError> {
        Err(TrackerError::SourceUnavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Source that answers only after a delay
pub struct SlowSource(pub Duration);

impl TelemetrySource for SlowSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawReport>, TrackerError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}
