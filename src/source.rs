//! Telemetry sources
//!
//! A source answers a [`FetchRequest`] with zero or more raw reports, or
//! fails. The payload is normalized later by the ingestion pipeline.

use std::future::Future;

use crate::{
    config::{SourceConfig, SourceMode},
    errors::TrackerError,
    models::VesselId,
    normalize::RawReport,
};

pub mod http;
pub mod mock;

pub use http::HttpSource;
pub use mock::MockSource;

/// Default look-back window of an on-demand track fetch
pub const DEFAULT_TIMESPAN_MINUTES: u32 = 60;

/// What to fetch from a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// Current snapshot of the whole fleet
    FleetSnapshot,
    /// Recent track, optionally restricted to one vessel
    Track {
        mmsi: Option<VesselId>,
        timespan_minutes: u32,
    },
}

impl FetchRequest {
    pub fn track(mmsi: Option<VesselId>) -> Self {
        FetchRequest::Track {
            mmsi,
            timespan_minutes: DEFAULT_TIMESPAN_MINUTES,
        }
    }
}

/// Provider of raw position reports
pub trait TelemetrySource: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<Vec<RawReport>, TrackerError>> + Send;
}

/// Source selected by configuration
#[derive(Debug)]
pub enum Source {
    Http(HttpSource),
    Mock(MockSource),
}

impl Source {
    pub fn from_config(config: &SourceConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        match config.mode {
            SourceMode::Http => Ok(Source::Http(HttpSource::new(config)?)),
            SourceMode::Mock => Ok(Source::Mock(MockSource::new(config.mock_vessels))),
        }
    }
}

impl TelemetrySource for Source {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawReport>, TrackerError> {
        match self {
            Source::Http(source) => source.fetch(request).await,
            Source::Mock(source) => source.fetch(request).await,
        }
    }
}
