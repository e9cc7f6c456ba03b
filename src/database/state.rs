//! Current vessel state, one row per vessel.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use crate::{
    errors::TrackerError,
    models::{PositionReport, VesselEdit, VesselId, VesselState, DEFAULT_VESSEL_NAME},
};

const VESSEL_COLUMNS: &str = "mmsi, name, image, is_active, lat, lon, speed, heading, course,
    status, last_seen, created_at, updated_at";

/// Vessel state store
#[derive(Debug, Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record telemetry for a vessel, creating the vessel on first sighting
    ///
    /// Existing vessels keep their name, image and active flag.
    pub async fn upsert_telemetry(
        &self,
        report: &PositionReport,
    ) -> Result<VesselState, TrackerError> {
        let now = Utc::now();
        let state = sqlx::query_as::<_, VesselState>(&format!(
            "INSERT INTO vessels (
                mmsi, name, is_active, lat, lon, speed, heading, course, status,
                last_seen, created_at, updated_at
            ) VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (mmsi) DO UPDATE SET
                lat = excluded.lat,
                lon = excluded.lon,
                speed = excluded.speed,
                heading = excluded.heading,
                course = excluded.course,
                status = excluded.status,
                last_seen = excluded.last_seen,
                updated_at = excluded.updated_at
            RETURNING {}",
            VESSEL_COLUMNS
        ))
        .bind(&report.mmsi)
        .bind(DEFAULT_VESSEL_NAME)
        .bind(report.lat)
        .bind(report.lon)
        .bind(report.speed)
        .bind(report.heading)
        .bind(report.course)
        .bind(report.status)
        .bind(report.timestamp)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(state)
    }

    pub async fn get(&self, mmsi: &VesselId) -> Result<Option<VesselState>, TrackerError> {
        let state = sqlx::query_as::<_, VesselState>(&format!(
            "SELECT {} FROM vessels WHERE mmsi = ?1",
            VESSEL_COLUMNS
        ))
        .bind(mmsi)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    /// All vessels ordered by vessel id
    pub async fn list_all(&self) -> Result<Vec<VesselState>, TrackerError> {
        let states = sqlx::query_as::<_, VesselState>(&format!(
            "SELECT {} FROM vessels ORDER BY mmsi",
            VESSEL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(states)
    }

    /// Vessels with the given ids, ordered by vessel id. Unknown ids are ignored.
    pub async fn list_by_ids(&self, ids: &[VesselId]) -> Result<Vec<VesselState>, TrackerError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM vessels WHERE mmsi IN (",
            VESSEL_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        builder.push(") ORDER BY mmsi");

        let states = builder
            .build_query_as::<VesselState>()
            .fetch_all(&self.pool)
            .await?;
        Ok(states)
    }

    /// Apply an operator edit
    ///
    /// Returns None for an unknown vessel. An empty edit returns the row as is.
    pub async fn update_editable_fields(
        &self,
        mmsi: &VesselId,
        edit: &VesselEdit,
    ) -> Result<Option<VesselState>, TrackerError> {
        if edit.is_empty() {
            return self.get(mmsi).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE vessels SET ");
        let mut fields = builder.separated(", ");
        if let Some(name) = &edit.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(image) = &edit.image {
            fields.push("image = ").push_bind_unseparated(image.clone());
        }
        if let Some(is_active) = edit.is_active {
            fields.push("is_active = ").push_bind_unseparated(is_active);
        }
        fields.push("updated_at = ").push_bind_unseparated(Utc::now());
        builder
            .push(" WHERE mmsi = ")
            .push_bind(mmsi.clone())
            .push(" RETURNING ")
            .push(VESSEL_COLUMNS);

        let state = builder
            .build_query_as::<VesselState>()
            .fetch_optional(&self.pool)
            .await?;
        if state.is_some() {
            info!(%mmsi, ?edit, "Vessel edited");
        }
        Ok(state)
    }

    /// Put the default name back on the given vessels, returning the rows matched
    pub async fn reset_names(&self, ids: &[VesselId]) -> Result<u64, TrackerError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE vessels SET name = ");
        builder
            .push_bind(DEFAULT_VESSEL_NAME)
            .push(", updated_at = ")
            .push_bind(Utc::now())
            .push(" WHERE mmsi IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        builder.push(")");

        let affected = builder
            .build()
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(affected, "Vessel names reset");
        Ok(affected)
    }

    /// Flip every active vessel to inactive, returning the number flipped
    pub async fn mark_all_inactive(&self) -> Result<u64, TrackerError> {
        let mut conn = self.pool.acquire().await?;
        mark_all_inactive(&mut conn, Utc::now()).await
    }

    /// Flip the given vessels to active, returning the number of rows matched
    pub async fn mark_active(&self, ids: &[VesselId]) -> Result<u64, TrackerError> {
        let mut conn = self.pool.acquire().await?;
        mark_active(&mut conn, ids, Utc::now()).await
    }

    /// Make exactly the given vessels active
    ///
    /// Runs [`Self::mark_all_inactive`] and [`Self::mark_active`] in one
    /// transaction. Returns the (deactivated, activated) counts.
    pub async fn refresh_active_set(&self, ids: &[VesselId]) -> Result<(u64, u64), TrackerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let deactivated = mark_all_inactive(&mut tx, now).await?;
        let activated = mark_active(&mut tx, ids, now).await?;
        tx.commit().await?;
        Ok((deactivated, activated))
    }
}

async fn mark_all_inactive(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<u64, TrackerError> {
    let affected = sqlx::query("UPDATE vessels SET is_active = 0, updated_at = ?1 WHERE is_active = 1")
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(affected)
}

async fn mark_active(
    conn: &mut SqliteConnection,
    ids: &[VesselId],
    now: DateTime<Utc>,
) -> Result<u64, TrackerError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE vessels SET is_active = 1, updated_at = ");
    builder.push_bind(now).push(" WHERE mmsi IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    builder.push(")");

    let affected = builder
        .build()
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(affected)
}
