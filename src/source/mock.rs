//! Mock telemetry source for development without an API key

use chrono::Utc;
use rand::Rng;
use serde_json::json;

use crate::{errors::TrackerError, normalize::RawReport};

use super::{FetchRequest, TelemetrySource};

const BASE_MMSI: u64 = 577_193_000;
const BASE_LAT: f64 = 21.209629;
const BASE_LON: f64 = -17.4624;

/// Generates a small fleet scattered around a fixed position
#[derive(Debug, Clone)]
pub struct MockSource {
    vessels: usize,
}

impl MockSource {
    pub fn new(vessels: usize) -> Self {
        Self { vessels }
    }

    fn generate(&self, request: &FetchRequest) -> Vec<RawReport> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let mut rng = rand::thread_rng();

        let ids: Vec<String> = match request {
            FetchRequest::Track {
                mmsi: Some(mmsi), ..
            } => vec![mmsi.to_string()],
            _ => (0..self.vessels as u64)
                .map(|i| (BASE_MMSI + i).to_string())
                .collect(),
        };

        ids.into_iter()
            .enumerate()
            .map(|(i, mmsi)| {
                if i == 0 && mmsi == BASE_MMSI.to_string() {
                    json!({
                        "MMSI": mmsi,
                        "LAT": format!("{:.6}", BASE_LAT),
                        "LON": format!("{:.6}", BASE_LON),
                        "SPEED": "99",
                        "HEADING": "181",
                        "COURSE": "184",
                        "STATUS": "0",
                        "TIMESTAMP": timestamp,
                    })
                } else {
                    json!({
                        "MMSI": mmsi,
                        "LAT": format!("{:.6}", BASE_LAT + rng.gen_range(-5.0..5.0)),
                        "LON": format!("{:.6}", BASE_LON + rng.gen_range(-5.0..5.0)),
                        "SPEED": rng.gen_range(0..100).to_string(),
                        "HEADING": rng.gen_range(0..360).to_string(),
                        "COURSE": rng.gen_range(0..360).to_string(),
                        "STATUS": rng.gen_range(0..15).to_string(),
                        "TIMESTAMP": timestamp,
                    })
                }
            })
            .collect()
    }
}

impl TelemetrySource for MockSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawReport>, TrackerError> {
        Ok(self.generate(request))
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new(5)
    }
}
