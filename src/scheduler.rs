//! Periodic full fleet refresh

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    config::ScheduleConfig, errors::TrackerError, ingest::Ingestor, source::TelemetrySource,
};

pub struct Scheduler<S> {
    ingestor: Ingestor<S>,
    interval: Duration,
    run_on_start: bool,
}

impl<S: TelemetrySource> Scheduler<S> {
    pub fn new(ingestor: Ingestor<S>, config: &ScheduleConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        Ok(Self {
            ingestor,
            interval: config.interval,
            run_on_start: config.run_on_start,
        })
    }

    /// Start ticking in a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Tick forever, starting one independent cycle per tick
    ///
    /// Cycles run in their own tasks, so a slow source never delays the
    /// next tick and cycles may overlap.
    pub async fn run(self) {
        let start = if self.run_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Scheduling fleet refresh every {:?}", self.interval);

        loop {
            ticker.tick().await;
            let ingestor = self.ingestor.clone();
            let interval = self.interval;
            tokio::spawn(async move {
                if ingestor.refresh_fleet().await.is_err() {
                    warn!("Scheduled fleet refresh failed, next attempt in {:?}", interval);
                }
            });
        }
    }
}
