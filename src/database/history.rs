//! Bounded per-vessel position history.
//!
//! Positions are unique per (mmsi, timestamp). A repeated report for the same
//! pair overwrites the measurement but keeps the row identity. After every
//! write only the [`RETENTION_CAP`] newest positions of the affected vessel
//! are kept.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::{
    errors::TrackerError,
    models::{HistoryFilter, HistoryQuery, PositionRecord, PositionReport, VesselId},
};

/// Maximum number of positions retained per vessel
pub const RETENTION_CAP: i64 = 10;

const SELECT_POSITIONS: &str = "SELECT id, mmsi, lat, lon, speed, heading, course, status,
        timestamp, created_at, updated_at
    FROM vessel_positions";

/// Position history store
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite a single position and apply retention for its vessel
    pub async fn append(&self, report: &PositionReport) -> Result<PositionRecord, TrackerError> {
        let mut tx = self.pool.begin().await?;
        let record = upsert_position(&mut *tx, report, Utc::now()).await?;
        trim_vessel(&mut *tx, &report.mmsi).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Insert or overwrite a batch of positions in one transaction
    ///
    /// Retention is applied to every vessel touched by the batch. On error
    /// the transaction is rolled back and nothing is written. Returns the
    /// number of distinct (mmsi, timestamp) positions written; duplicates
    /// within the batch count once, the last one winning.
    pub async fn append_batch(&self, reports: &[PositionReport]) -> Result<usize, TrackerError> {
        if reports.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for report in reports {
            upsert_position(&mut *tx, report, now).await?;
        }

        let vessels: BTreeSet<&VesselId> = reports.iter().map(|r| &r.mmsi).collect();
        for mmsi in vessels {
            trim_vessel(&mut *tx, mmsi).await?;
        }

        tx.commit().await?;

        let positions: BTreeSet<(&VesselId, DateTime<Utc>)> =
            reports.iter().map(|r| (&r.mmsi, r.timestamp)).collect();
        Ok(positions.len())
    }

    /// Positions of one vessel, newest first
    pub async fn list_by_vessel(
        &self,
        mmsi: &VesselId,
        limit: u32,
    ) -> Result<Vec<PositionRecord>, TrackerError> {
        let records = sqlx::query_as::<_, PositionRecord>(&format!(
            "{} WHERE mmsi = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            SELECT_POSITIONS
        ))
        .bind(mmsi)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Most recent position of each vessel, ordered by vessel id
    pub async fn list_latest_across_fleet(
        &self,
        limit: u32,
    ) -> Result<Vec<PositionRecord>, TrackerError> {
        let records = sqlx::query_as::<_, PositionRecord>(
            "SELECT id, mmsi, lat, lon, speed, heading, course, status,
                    timestamp, created_at, updated_at
            FROM (
                SELECT *, ROW_NUMBER() OVER (
                    PARTITION BY mmsi ORDER BY timestamp DESC, id DESC
                ) AS rn
                FROM vessel_positions
            )
            WHERE rn = 1
            ORDER BY mmsi
            LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// One page of history, newest first
    pub async fn list_filtered(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<PositionRecord>, TrackerError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_POSITIONS);
        push_filter(&mut builder, &query.filter);
        builder
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));

        let records = builder
            .build_query_as::<PositionRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Number of positions matching the filter
    pub async fn count(&self, filter: &HistoryFilter) -> Result<u64, TrackerError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM vessel_positions");
        push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn get(&self, id: i64) -> Result<Option<PositionRecord>, TrackerError> {
        let record = sqlx::query_as::<_, PositionRecord>(&format!(
            "{} WHERE id = ?1",
            SELECT_POSITIONS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &HistoryFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(mmsi) = &filter.mmsi {
        builder.push(" AND mmsi = ").push_bind(mmsi.clone());
    }
    if let Some(start) = filter.start {
        builder.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = filter.end {
        builder.push(" AND timestamp <= ").push_bind(end);
    }
}

async fn upsert_position(
    conn: &mut SqliteConnection,
    report: &PositionReport,
    now: DateTime<Utc>,
) -> Result<PositionRecord, TrackerError> {
    let record = sqlx::query_as::<_, PositionRecord>(
        "INSERT INTO vessel_positions (
            mmsi, lat, lon, speed, heading, course, status,
            timestamp, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT (mmsi, timestamp) DO UPDATE SET
            lat = excluded.lat,
            lon = excluded.lon,
            speed = excluded.speed,
            heading = excluded.heading,
            course = excluded.course,
            status = excluded.status,
            updated_at = excluded.updated_at
        RETURNING id, mmsi, lat, lon, speed, heading, course, status,
            timestamp, created_at, updated_at",
    )
    .bind(&report.mmsi)
    .bind(report.lat)
    .bind(report.lon)
    .bind(report.speed)
    .bind(report.heading)
    .bind(report.course)
    .bind(report.status)
    .bind(report.timestamp)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(record)
}

/// Delete everything but the newest [`RETENTION_CAP`] positions of one vessel
async fn trim_vessel(conn: &mut SqliteConnection, mmsi: &VesselId) -> Result<u64, TrackerError> {
    let deleted = sqlx::query(
        "DELETE FROM vessel_positions
        WHERE id IN (
            SELECT id FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY timestamp DESC, id DESC) AS rn
                FROM vessel_positions
                WHERE mmsi = ?1
            )
            WHERE rn > ?2
        )",
    )
    .bind(mmsi)
    .bind(RETENTION_CAP)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if deleted > 0 {
        debug!(%mmsi, deleted, "Evicted old positions");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::{Duration, TimeZone};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Database {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Database::new(pool).await.unwrap()
    }

    fn report(mmsi: &str, minute: i64, speed: Option<i32>) -> PositionReport {
        PositionReport {
            mmsi: VesselId::try_from(mmsi).unwrap(),
            lat: 60.03802,
            lon: 20.345818,
            speed,
            heading: Some(325),
            course: Some(326),
            status: Some(0),
            timestamp: Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn test_append_returns_stored_record() -> Result<(), TrackerError> {
        let db = setup_test_db().await;
        let history = db.history();

        let stored = history.append(&report("123456", 0, Some(10))).await?;
        assert_eq!(stored.mmsi.as_str(), "123456");
        assert_eq!(stored.speed, Some(10));
        assert_eq!(stored.created_at, stored.updated_at);

        let fetched = history.get(stored.id).await?;
        assert_eq!(fetched, Some(stored));
        Ok(())
    }

    #[tokio::test]
    async fn test_append_overwrites_same_timestamp() -> Result<(), TrackerError> {
        let db = setup_test_db().await;
        let history = db.history();

        let first = history.append(&report("123456", 0, Some(10))).await?;
        let second = history.append(&report("123456", 0, None)).await?;

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.speed, None);
        assert!(second.updated_at >= first.updated_at);

        let vid = VesselId::try_from("123456").unwrap();
        assert_eq!(history.list_by_vessel(&vid, 100).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() -> Result<(), TrackerError> {
        let db = setup_test_db().await;
        assert_eq!(db.history().append_batch(&[]).await?, 0);
        assert_eq!(db.history().count(&HistoryFilter::default()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_counts_duplicate_positions_once() -> Result<(), TrackerError> {
        let db = setup_test_db().await;
        let history = db.history();

        let batch = vec![
            report("123456", 0, Some(10)),
            report("123456", 0, Some(11)),
            report("123456", 1, Some(12)),
        ];
        assert_eq!(history.append_batch(&batch).await?, 2);

        let vid = VesselId::try_from("123456").unwrap();
        let records = history.list_by_vessel(&vid, 100).await?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].speed, Some(11));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_unknown_id() -> Result<(), TrackerError> {
        let db = setup_test_db().await;
        assert_eq!(db.history().get(42).await?, None);
        Ok(())
    }
}
