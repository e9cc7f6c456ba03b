//! Ingestion pipeline
//!
//! One cycle goes `Fetching -> Normalizing -> Writing -> Done`, or ends in
//! `Failed`. History is written before state. The two stores do not share a
//! transaction: if the state write fails, the history written by the same
//! cycle stays and the cycle is reported as failed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    config::{OnSourceFailure, SourceConfig},
    database::Database,
    errors::TrackerError,
    models::{PositionReport, VesselId},
    normalize::{normalize_batch, RawReport},
    source::{FetchRequest, TelemetrySource},
};

/// What triggered a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// Scheduled full fleet refresh, maintains the active flags
    FleetSnapshot,
    /// Fetch requested by an operator
    OnDemand,
    /// Payload supplied by the caller, nothing fetched; seeded vessels get
    /// the default name back
    Seed,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CycleKind::FleetSnapshot => "fleet snapshot",
            CycleKind::OnDemand => "on-demand",
            CycleKind::Seed => "seed",
        })
    }
}

impl From<&FetchRequest> for CycleKind {
    fn from(request: &FetchRequest) -> Self {
        match request {
            FetchRequest::FleetSnapshot => CycleKind::FleetSnapshot,
            FetchRequest::Track { .. } => CycleKind::OnDemand,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Fetching,
    Normalizing,
    Writing,
    Done,
    Failed,
}

/// Outcome of one ingestion cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub phase: CyclePhase,
    /// Raw reports received from the source
    pub attempted: usize,
    /// Distinct positions written to history
    pub written: usize,
    /// Malformed reports dropped
    pub skipped: usize,
    /// Vessel state rows upserted
    pub vessels_updated: usize,
    pub deactivated: u64,
    pub activated: u64,
    /// Source failed and the cycle completed without data
    pub degraded: bool,
}

impl CycleReport {
    fn new(kind: CycleKind) -> Self {
        Self {
            kind,
            phase: CyclePhase::Fetching,
            attempted: 0,
            written: 0,
            skipped: 0,
            vessels_updated: 0,
            deactivated: 0,
            activated: 0,
            degraded: false,
        }
    }

    fn finish(mut self) -> Self {
        self.phase = CyclePhase::Done;
        info!(
            kind = %self.kind,
            attempted = self.attempted,
            written = self.written,
            skipped = self.skipped,
            vessels = self.vessels_updated,
            deactivated = self.deactivated,
            activated = self.activated,
            degraded = self.degraded,
            "Ingestion cycle finished"
        );
        self
    }

    fn fail(mut self, error: TrackerError) -> CycleFailure {
        let failed_in = self.phase;
        self.phase = CyclePhase::Failed;
        error!(
            kind = %self.kind,
            phase = ?failed_in,
            attempted = self.attempted,
            written = self.written,
            skipped = self.skipped,
            "Ingestion cycle failed: {}",
            error
        );
        CycleFailure {
            failed_in,
            report: self,
            error,
        }
    }
}

/// A cycle that ended in `Failed`, with the counts reached so far
#[derive(Debug, Error)]
#[error("{} cycle failed while {:?}: {}", .report.kind, .failed_in, .error)]
pub struct CycleFailure {
    pub failed_in: CyclePhase,
    pub report: CycleReport,
    #[source]
    pub error: TrackerError,
}

/// Runs ingestion cycles against a telemetry source
pub struct Ingestor<S> {
    db: Database,
    source: Arc<S>,
    fetch_timeout: Duration,
    on_failure: OnSourceFailure,
}

impl<S> Clone for Ingestor<S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            source: Arc::clone(&self.source),
            fetch_timeout: self.fetch_timeout,
            on_failure: self.on_failure,
        }
    }
}

impl<S: TelemetrySource> Ingestor<S> {
    pub fn new(db: Database, source: S, config: &SourceConfig) -> Self {
        Self::with_policy(db, source, config.timeout, config.on_failure)
    }

    pub fn with_policy(
        db: Database,
        source: S,
        fetch_timeout: Duration,
        on_failure: OnSourceFailure,
    ) -> Self {
        Self {
            db,
            source: Arc::new(source),
            fetch_timeout,
            on_failure,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Full fleet snapshot; vessels missing from the snapshot become inactive
    pub async fn refresh_fleet(&self) -> Result<CycleReport, CycleFailure> {
        self.run(FetchRequest::FleetSnapshot).await
    }

    /// Fetch recent track data without touching the active flags
    pub async fn fetch_on_demand(
        &self,
        mmsi: Option<VesselId>,
        timespan_minutes: u32,
    ) -> Result<CycleReport, CycleFailure> {
        self.run(FetchRequest::Track {
            mmsi,
            timespan_minutes,
        })
        .await
    }

    /// Run one full cycle for the request
    pub async fn run(&self, request: FetchRequest) -> Result<CycleReport, CycleFailure> {
        let mut report = CycleReport::new(CycleKind::from(&request));
        info!(kind = %report.kind, "Starting ingestion cycle");

        let raws = match self.fetch(&request).await {
            Ok(raws) => raws,
            Err(e) => match self.on_failure {
                OnSourceFailure::Fail => return Err(report.fail(e)),
                OnSourceFailure::Skip => {
                    warn!("Source failed, completing cycle without data: {}", e);
                    report.degraded = true;
                    return Ok(report.finish());
                }
            },
        };

        self.process(report, &raws).await
    }

    /// Normalize and write a caller-supplied payload
    pub async fn ingest(
        &self,
        kind: CycleKind,
        raws: &[RawReport],
    ) -> Result<CycleReport, CycleFailure> {
        self.process(CycleReport::new(kind), raws).await
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawReport>, TrackerError> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch(request))
            .await
            .map_err(|_| {
                TrackerError::SourceUnavailable(format!(
                    "no answer within {:?}",
                    self.fetch_timeout
                ))
            })?
    }

    async fn process(
        &self,
        mut report: CycleReport,
        raws: &[RawReport],
    ) -> Result<CycleReport, CycleFailure> {
        report.phase = CyclePhase::Normalizing;
        report.attempted = raws.len();
        let batch = normalize_batch(raws);
        report.skipped = batch.skipped;

        report.phase = CyclePhase::Writing;
        match self.db.history().append_batch(&batch.reports).await {
            Ok(written) => report.written = written,
            Err(e) => return Err(report.fail(TrackerError::write_failed("history", e))),
        }

        let latest = latest_per_vessel(&batch.reports);
        let state = self.db.state();
        for position in latest.values() {
            if let Err(e) = state.upsert_telemetry(position).await {
                return Err(report.fail(TrackerError::write_failed("state", e)));
            }
            report.vessels_updated += 1;
        }

        if latest.is_empty() {
            return Ok(report.finish());
        }
        let seen: Vec<VesselId> = latest.into_keys().cloned().collect();
        match report.kind {
            CycleKind::FleetSnapshot => match state.refresh_active_set(&seen).await {
                Ok((deactivated, activated)) => {
                    report.deactivated = deactivated;
                    report.activated = activated;
                }
                Err(e) => return Err(report.fail(TrackerError::write_failed("state", e))),
            },
            CycleKind::Seed => {
                if let Err(e) = state.reset_names(&seen).await {
                    return Err(report.fail(TrackerError::write_failed("state", e)));
                }
            }
            CycleKind::OnDemand => {}
        }

        Ok(report.finish())
    }
}

/// Newest report of every vessel in the batch; later entries win ties
fn latest_per_vessel(reports: &[PositionReport]) -> BTreeMap<&VesselId, &PositionReport> {
    let mut latest: BTreeMap<&VesselId, &PositionReport> = BTreeMap::new();
    for report in reports {
        latest
            .entry(&report.mmsi)
            .and_modify(|current| {
                if report.timestamp >= current.timestamp {
                    *current = report;
                }
            })
            .or_insert(report);
    }
    latest
}
