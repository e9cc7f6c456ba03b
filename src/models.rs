//! Data models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

/// Placeholder name given to vessels first seen through telemetry
pub const DEFAULT_VESSEL_NAME: &str = "Vessel";

/// Vessel identifier
///
/// Usually a nine-digit Maritime Mobile Service Identity (MMSI), kept as text
/// since the upstream source does not guarantee a numeric form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct VesselId(String);

impl TryFrom<String> for VesselId {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TrackerError::InvalidVesselId(value));
        }
        if trimmed.len() == value.len() {
            Ok(Self(value))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }
}

impl TryFrom<&str> for VesselId {
    type Error = TrackerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<VesselId> for String {
    fn from(value: VesselId) -> Self {
        value.0
    }
}

impl VesselId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized position report, ready to be written to both stores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    pub mmsi: VesselId,
    /// Latitude in WGS84 decimal degrees
    pub lat: f64,
    /// Longitude in WGS84 decimal degrees
    pub lon: f64,
    /// Speed as reported by the source, None if not reported
    pub speed: Option<i32>,
    /// Heading in degrees, None if not reported
    pub heading: Option<i32>,
    /// Course over ground in degrees, None if not reported
    pub course: Option<i32>,
    /// Navigational status code, None if not reported
    pub status: Option<i32>,
    /// Time of the position fix
    pub timestamp: DateTime<Utc>,
}

/// Stored history entry
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PositionRecord {
    pub id: i64,
    pub mmsi: VesselId,
    pub lat: f64,
    pub lon: f64,
    pub speed: Option<i32>,
    pub heading: Option<i32>,
    pub course: Option<i32>,
    pub status: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current state of a single vessel
///
/// `name`, `image` and `is_active` belong to operators. Telemetry only
/// moves the position fields and `last_seen`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct VesselState {
    pub mmsi: VesselId,
    pub name: String,
    pub image: Option<String>,
    pub is_active: bool,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub speed: Option<i32>,
    pub heading: Option<i32>,
    pub course: Option<i32>,
    pub status: Option<i32>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator edit of a vessel; fields left as None are not touched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VesselEdit {
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
}

impl VesselEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image.is_none() && self.is_active.is_none()
    }
}

/// Filters shared by history listing and counting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub mmsi: Option<VesselId>,
    /// Inclusive lower bound on the position timestamp
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the position timestamp
    pub end: Option<DateTime<Utc>>,
}

/// One page of filtered history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub filter: HistoryFilter,
    pub limit: u32,
    pub offset: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            filter: HistoryFilter::default(),
            limit: 100,
            offset: 0,
        }
    }
}

impl HistoryQuery {
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            limit,
            offset,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: HistoryFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vessel_id_is_trimmed() {
        let id = VesselId::try_from("  577193000 ").unwrap();
        assert_eq!(id.as_str(), "577193000");
    }

    #[test]
    fn vessel_id_rejects_blank() {
        assert!(VesselId::try_from("").is_err());
        assert!(VesselId::try_from("   ").is_err());
    }

    #[test]
    fn vessel_id_serde_roundtrip_validates() {
        let id: VesselId = serde_json::from_str(r#""352005591""#).unwrap();
        assert_eq!(id.to_string(), "352005591");
        assert!(serde_json::from_str::<VesselId>(r#""""#).is_err());
    }

    #[test]
    fn parse_vessel_edit() {
        let s = r#"{ "name": "MV Example", "isActive": false }"#;
        let edit: VesselEdit = serde_json::from_str(s).unwrap();
        assert_eq!(
            edit,
            VesselEdit {
                name: Some("MV Example".to_string()),
                image: None,
                is_active: Some(false),
            }
        );
        assert!(!edit.is_empty());
        assert!(VesselEdit::default().is_empty());
    }

    #[test]
    fn history_query_defaults() {
        let query = HistoryQuery::default();
        assert_eq!(query.limit, 100);
        assert_eq!(query.offset, 0);
        assert_eq!(query.filter, HistoryFilter::default());
    }
}
