//! Normalization of raw telemetry reports.
//!
//! Upstream reports are loosely typed: every attribute may arrive under an
//! upper-case or lower-case key, as a number or as a numeric string. This
//! module turns them into [`PositionReport`]s. Anything other than a JSON
//! object is malformed.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::{
    errors::TrackerError,
    models::{PositionReport, VesselId},
};

/// Raw report as received from a telemetry source, one item of a response array
pub type RawReport = Value;

const KEY_MMSI: &str = "MMSI";
const KEY_LAT: &str = "LAT";
const KEY_LON: &str = "LON";
const KEY_SPEED: &str = "SPEED";
const KEY_HEADING: &str = "HEADING";
const KEY_COURSE: &str = "COURSE";
const KEY_STATUS: &str = "STATUS";
const KEY_TIMESTAMP: &str = "TIMESTAMP";

/// Epoch values above this are taken as milliseconds
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Result of normalizing a batch of raw reports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub reports: Vec<PositionReport>,
    /// Number of reports dropped as malformed
    pub skipped: usize,
}

/// Normalize a single raw report
pub fn normalize(raw: &RawReport) -> Result<PositionReport, TrackerError> {
    let raw = raw.as_object().ok_or_else(|| {
        TrackerError::MalformedRecord(format!("expected a JSON object, got {}", raw))
    })?;
    let mmsi = parse_vessel_id(field(raw, KEY_MMSI))?;
    let timestamp = field(raw, KEY_TIMESTAMP)
        .ok_or_else(|| malformed(&mmsi, "missing timestamp"))
        .and_then(|value| {
            parse_timestamp(value)
                .ok_or_else(|| malformed(&mmsi, &format!("unparsable timestamp {}", value)))
        })?;

    let lat = parse_coordinate(raw, KEY_LAT, 90.0).map_err(|e| malformed(&mmsi, &e))?;
    let lon = parse_coordinate(raw, KEY_LON, 180.0).map_err(|e| malformed(&mmsi, &e))?;

    Ok(PositionReport {
        lat,
        lon,
        speed: parse_optional_int(raw, KEY_SPEED),
        heading: parse_optional_int(raw, KEY_HEADING),
        course: parse_optional_int(raw, KEY_COURSE),
        status: parse_optional_int(raw, KEY_STATUS),
        timestamp,
        mmsi,
    })
}

/// Normalize a batch, dropping and counting malformed reports
pub fn normalize_batch(raws: &[RawReport]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        reports: Vec::with_capacity(raws.len()),
        skipped: 0,
    };

    for raw in raws {
        match normalize(raw) {
            Ok(report) => batch.reports.push(report),
            Err(e) => {
                warn!("Skipping report: {}", e);
                batch.skipped += 1;
            }
        }
    }

    batch
}

fn malformed(mmsi: &VesselId, reason: &str) -> TrackerError {
    TrackerError::MalformedRecord(format!("vessel {}: {}", mmsi, reason))
}

/// Look up an attribute by its upper-case key, its lower-case key, or any
/// case-insensitive match. Null and blank strings count as absent.
fn field<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let lower = key.to_ascii_lowercase();
    [raw.get(key), raw.get(&lower)]
        .into_iter()
        .flatten()
        .chain(
            raw.iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
        )
        .find(|value| !is_blank(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_vessel_id(value: Option<&Value>) -> Result<VesselId, TrackerError> {
    match value {
        Some(Value::String(s)) => VesselId::try_from(s.as_str()),
        Some(Value::Number(n)) => integer_text(n)
            .ok_or_else(|| TrackerError::MalformedRecord(format!("non-integer vessel id {}", n)))
            .and_then(VesselId::try_from),
        Some(other) => Err(TrackerError::MalformedRecord(format!(
            "unsupported vessel id {}",
            other
        ))),
        None => Err(TrackerError::MalformedRecord(
            "missing vessel id".to_string(),
        )),
    }
    .map_err(|e| match e {
        TrackerError::InvalidVesselId(id) => {
            TrackerError::MalformedRecord(format!("invalid vessel id {:?}", id))
        }
        other => other,
    })
}

/// Decimal text of an integral JSON number, including floats such as `2.3e8`
fn integer_text(n: &Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return Some(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    n.as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15)
        .map(|f| format!("{:.0}", f))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_coordinate(raw: &Map<String, Value>, key: &str, bound: f64) -> Result<f64, String> {
    let value = field(raw, key).ok_or_else(|| format!("missing {}", key))?;
    let parsed = as_f64(value)
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{} is not a number: {}", key, value))?;
    if parsed.abs() > bound {
        return Err(format!("{} out of range: {}", key, parsed));
    }
    Ok(parsed)
}

/// Optional integer field. Zero is a valid reading and is kept.
fn parse_optional_int(raw: &Map<String, Value>, key: &str) -> Option<i32> {
    let value = field(raw, key)?;
    let parsed = as_f64(value)
        .filter(|v| v.is_finite() && *v >= i32::MIN as f64 && *v <= i32::MAX as f64)
        .map(|v| v.trunc() as i32);
    if parsed.is_none() {
        debug!("Ignoring unparsable {}: {}", key, value);
    }
    parsed
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::Number(n) => {
            let epoch = n.as_i64()?;
            if epoch > EPOCH_MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(epoch)
            } else {
                DateTime::from_timestamp(epoch, 0)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NAIVE_FORMATS
                        .iter()
                        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }?;
    parsed.with_nanosecond(0)
}
