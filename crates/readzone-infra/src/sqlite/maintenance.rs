//! SQLite maintenance repository: raw row access for the operator tooling.
//!
//! Unlike the draft repository, this sees legacy-shaped rows and is the only
//! adapter that changes row shape.

use chrono::{DateTime, Utc};
use readzone_core::repository::maintenance::{MaintenanceRepository, OwnerOverLimit, ShapeCounts};
use readzone_types::book::BookId;
use readzone_types::draft::{Draft, DraftId};
use readzone_types::error::RepositoryError;
use readzone_types::maintenance::DraftRecord;
use sqlx::Row;

use super::draft::{CURRENT_SHAPE, row_to_draft};
use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

const RECORD_SELECT: &str = "SELECT d.id, d.owner_id, d.book_id, d.status, d.version, d.expires_at,
        d.last_accessed_at, d.updated_at,
        u.id IS NOT NULL AS owner_exists,
        (d.book_id IS NULL OR b.id IS NOT NULL) AS book_exists
     FROM review_drafts d
     LEFT JOIN users u ON u.id = d.owner_id
     LEFT JOIN books b ON b.id = d.book_id";

#[derive(Clone)]
pub struct SqliteMaintenanceRepository {
    pool: DatabasePool,
}

impl SqliteMaintenanceRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn records(&self, condition: &str, after: Option<&DraftId>, limit: i64) -> Result<Vec<DraftRecord>, RepositoryError> {
        let sql = format!("{RECORD_SELECT} WHERE d.id > ? AND {condition} ORDER BY d.id ASC LIMIT ?");
        let rows = self
            .pool
            .timed(
                "maintenance.records",
                sqlx::query(&sql)
                    .bind(after.map(|a| a.to_string()).unwrap_or_default())
                    .bind(limit)
                    .fetch_all(&self.pool.reader),
            )
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<DraftRecord, RepositoryError> {
    let q = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(q)?;
    let book_id: Option<String> = row.try_get("book_id").map_err(q)?;
    let expires_at: Option<String> = row.try_get("expires_at").map_err(q)?;
    let last_accessed_at: Option<String> = row.try_get("last_accessed_at").map_err(q)?;
    let updated_at: String = row.try_get("updated_at").map_err(q)?;

    Ok(DraftRecord {
        id: id
            .parse::<DraftId>()
            .map_err(|e| RepositoryError::Query(format!("invalid draft id: {e}")))?,
        owner_id: row.try_get("owner_id").map_err(q)?,
        book_id: book_id
            .as_deref()
            .map(|raw| {
                raw.parse::<BookId>()
                    .map_err(|e| RepositoryError::Query(format!("invalid book id: {e}")))
            })
            .transpose()?,
        status: row.try_get("status").map_err(q)?,
        version: row.try_get("version").map_err(q)?,
        expires_at: expires_at.as_deref().map(parse_datetime).transpose()?,
        last_accessed_at: last_accessed_at.as_deref().map(parse_datetime).transpose()?,
        updated_at: parse_datetime(&updated_at)?,
        owner_exists: row.try_get("owner_exists").map_err(q)?,
        book_exists: row.try_get("book_exists").map_err(q)?,
    })
}

impl MaintenanceRepository for SqliteMaintenanceRepository {
    async fn shape_counts(&self, now: DateTime<Utc>) -> Result<ShapeCounts, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN {CURRENT_SHAPE} THEN 1 ELSE 0 END), 0) AS current_shape,
                    COALESCE(SUM(CASE WHEN expires_at IS NOT NULL AND expires_at < ? THEN 1 ELSE 0 END), 0) AS expired
             FROM review_drafts"
        ))
        .bind(format_datetime(&now))
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let get = |col: &str| -> Result<u64, RepositoryError> {
            row.try_get::<i64, _>(col)
                .map(|n| n as u64)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        };

        Ok(ShapeCounts {
            total: get("total")?,
            current_shape: get("current_shape")?,
            expired: get("expired")?,
        })
    }

    async fn scan_records(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> Result<Vec<DraftRecord>, RepositoryError> {
        self.records("1 = 1", after, limit).await
    }

    async fn legacy_records(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> Result<Vec<DraftRecord>, RepositoryError> {
        self.records(&format!("NOT ({CURRENT_SHAPE})"), after, limit).await
    }

    async fn upgrade_record(
        &self,
        id: &DraftId,
        expires_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE review_drafts
             SET status = COALESCE(status, 'active'),
                 version = COALESCE(version, 1),
                 expires_at = COALESCE(expires_at, ?),
                 last_accessed_at = COALESCE(last_accessed_at, ?)
             WHERE id = ? AND NOT ({CURRENT_SHAPE})"
        ))
        .bind(format_datetime(&expires_at))
        .bind(format_datetime(&last_accessed_at))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn downgrade_batch(&self, limit: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE review_drafts
             SET status = NULL, version = NULL, expires_at = NULL, last_accessed_at = NULL
             WHERE id IN (
                 SELECT id FROM review_drafts
                 WHERE status IS NOT NULL OR version IS NOT NULL
                    OR expires_at IS NOT NULL OR last_accessed_at IS NOT NULL
                 LIMIT ?
             )",
        )
        .bind(limit)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected())
    }

    async fn retired_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Draft>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM review_drafts
             WHERE status IN ('expired', 'abandoned') AND updated_at < ? AND {CURRENT_SHAPE}
             ORDER BY updated_at ASC LIMIT ?"
        ))
        .bind(format_datetime(&cutoff))
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter().map(row_to_draft).collect()
    }

    async fn owners_over_limit(&self, max_active: u64) -> Result<Vec<OwnerOverLimit>, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT owner_id, COUNT(*) FROM review_drafts
             WHERE status = 'active' AND {CURRENT_SHAPE}
             GROUP BY owner_id HAVING COUNT(*) > ?
             ORDER BY owner_id"
        ))
        .bind(max_active as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .map(|(owner_id, n)| OwnerOverLimit {
                owner_id,
                active_drafts: n as u64,
            })
            .collect())
    }

    async fn orphaned_records(&self, limit: i64) -> Result<Vec<DraftRecord>, RepositoryError> {
        self.records("u.id IS NULL", None, limit).await
    }

    async fn remove_record(&self, id: &DraftId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM review_drafts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn optimize(&self) -> Result<(), RepositoryError> {
        sqlx::query("PRAGMA optimize")
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        tracing::debug!("ran PRAGMA optimize");
        Ok(())
    }
}
