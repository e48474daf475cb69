//! SQLite draft audit trail implementation.
//!
//! Append-only: entries are never updated, and only removed by age-based
//! pruning when an operator configures audit retention.

use chrono::{DateTime, Utc};
use readzone_core::repository::audit::AuditRepository;
use readzone_types::audit::{AuditAction, AuditEntry};
use readzone_types::draft::DraftId;
use readzone_types::error::RepositoryError;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed draft audit trail.
#[derive(Clone)]
pub struct SqliteAuditRepository {
    pool: DatabasePool,
}

impl SqliteAuditRepository {
    /// Create a new audit repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Insert one entry on an open connection, typically inside the draft write's transaction.
pub(crate) async fn insert_audit(
    conn: &mut SqliteConnection,
    entry: &AuditEntry,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"INSERT INTO review_draft_audit (id, draft_id, actor_id, action, before_snapshot, after_snapshot, details, occurred_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(entry.id.to_string())
    .bind(entry.draft_id.to_string())
    .bind(&entry.actor_id)
    .bind(entry.action.to_string())
    .bind(&entry.before_snapshot)
    .bind(&entry.after_snapshot)
    .bind(&entry.details)
    .bind(format_datetime(&entry.occurred_at))
    .execute(conn)
    .await
    .map_err(query_error)?;

    Ok(())
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let get = |col: &str| -> Result<String, RepositoryError> {
        row.try_get(col)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    };
    let optional = |col: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get(col)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    };

    let id = Uuid::parse_str(&get("id")?)
        .map_err(|e| RepositoryError::Query(format!("invalid audit id: {e}")))?;
    let draft_id = get("draft_id")?
        .parse::<DraftId>()
        .map_err(|e| RepositoryError::Query(format!("invalid draft id: {e}")))?;
    let action: AuditAction = get("action")?.parse().map_err(RepositoryError::Query)?;

    Ok(AuditEntry {
        id,
        draft_id,
        actor_id: get("actor_id")?,
        action,
        before_snapshot: optional("before_snapshot")?,
        after_snapshot: optional("after_snapshot")?,
        details: optional("details")?,
        occurred_at: parse_datetime(&get("occurred_at")?)?,
    })
}

impl AuditRepository for SqliteAuditRepository {
    async fn append(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        let mut conn = self.pool.writer.acquire().await.map_err(query_error)?;
        insert_audit(&mut conn, entry).await
    }

    async fn list_for_draft(
        &self,
        draft_id: &DraftId,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let mut sql = String::from(
            "SELECT * FROM review_draft_audit WHERE draft_id = ? ORDER BY occurred_at DESC, id DESC",
        );

        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let rows = sqlx::query(&sql)
            .bind(draft_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn count_by_action_since(
        &self,
        action: AuditAction,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM review_draft_audit WHERE action = ? AND occurred_at >= ?",
        )
        .bind(action.to_string())
        .bind(format_datetime(&since))
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(count as u64)
    }

    async fn last_occurred(&self, action: AuditAction) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let last: Option<String> =
            sqlx::query_scalar("SELECT MAX(occurred_at) FROM review_draft_audit WHERE action = ?")
                .bind(action.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_error)?;

        last.as_deref().map(parse_datetime).transpose()
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM review_draft_audit")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;

        Ok(count as u64)
    }

    async fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM review_draft_audit WHERE occurred_at < ?")
                .bind(format_datetime(&cutoff))
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_error)?;

        Ok(count as u64)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM review_draft_audit WHERE occurred_at < ?")
            .bind(format_datetime(&cutoff))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        tracing::info!(pruned = result.rows_affected(), "pruned draft audit entries");
        Ok(result.rows_affected())
    }
}
