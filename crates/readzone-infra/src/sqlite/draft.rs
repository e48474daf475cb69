//! SQLite draft repository implementation.
//!
//! Implements `DraftRepository` from `readzone-core` using sqlx with split
//! read/write pools. Every write commits its audit entry in the same
//! transaction. Legacy-shaped rows (NULL lifecycle columns) are filtered out.

use chrono::{DateTime, SubsecRound, Utc};
use readzone_core::repository::SortOrder;
use readzone_core::repository::draft::{CasOutcome, DraftFilter, DraftRepository, Expected};
use readzone_types::audit::AuditEntry;
use readzone_types::book::BookId;
use readzone_types::draft::{Draft, DraftId, DraftMetadata, DraftStatus};
use readzone_types::error::RepositoryError;
use sqlx::Row;

use super::audit::insert_audit;
use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error, write_error};

/// Rows with every lifecycle column populated.
pub(crate) const CURRENT_SHAPE: &str = "status IS NOT NULL AND version IS NOT NULL \
     AND expires_at IS NOT NULL AND last_accessed_at IS NOT NULL";

/// `draft` as a later read returns it: timestamps cut to stored microseconds.
fn as_stored(draft: &Draft) -> Draft {
    let mut stored = draft.clone();
    stored.expires_at = draft.expires_at.trunc_subsecs(6);
    stored.last_accessed_at = draft.last_accessed_at.trunc_subsecs(6);
    stored.created_at = draft.created_at.trunc_subsecs(6);
    stored.updated_at = draft.updated_at.trunc_subsecs(6);
    stored
}

/// SQLite-backed implementation of `DraftRepository`.
#[derive(Clone)]
pub struct SqliteDraftRepository {
    pool: DatabasePool,
}

impl SqliteDraftRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch_current(&self, id: &DraftId) -> Result<Option<Draft>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT * FROM review_drafts WHERE id = ? AND {CURRENT_SHAPE}"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(query_error)?;

        row.as_ref().map(row_to_draft).transpose()
    }
}

/// Internal row type for mapping SQLite rows to a domain Draft.
struct DraftRow {
    id: String,
    owner_id: String,
    book_id: Option<String>,
    book_data: Option<String>,
    title: Option<String>,
    content: String,
    metadata: String,
    status: String,
    version: i64,
    expires_at: String,
    last_accessed_at: String,
    created_at: String,
    updated_at: String,
}

impl DraftRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            book_id: row.try_get("book_id")?,
            book_data: row.try_get("book_data")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            status: row.try_get("status")?,
            version: row.try_get("version")?,
            expires_at: row.try_get("expires_at")?,
            last_accessed_at: row.try_get("last_accessed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_draft(self) -> Result<Draft, RepositoryError> {
        let id = self
            .id
            .parse::<DraftId>()
            .map_err(|e| RepositoryError::Query(format!("invalid draft id: {e}")))?;

        let book_id = self
            .book_id
            .as_deref()
            .map(|raw| {
                raw.parse::<BookId>()
                    .map_err(|e| RepositoryError::Query(format!("invalid book id: {e}")))
            })
            .transpose()?;

        let status: DraftStatus = self.status.parse().map_err(RepositoryError::Query)?;

        let metadata: DraftMetadata = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;

        Ok(Draft {
            id,
            owner_id: self.owner_id,
            book_id,
            book_data: self.book_data,
            title: self.title,
            content: self.content,
            metadata,
            status,
            version: self.version,
            expires_at: parse_datetime(&self.expires_at)?,
            last_accessed_at: parse_datetime(&self.last_accessed_at)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

pub(crate) fn row_to_draft(row: &sqlx::sqlite::SqliteRow) -> Result<Draft, RepositoryError> {
    DraftRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_draft()
}

fn metadata_json(draft: &Draft) -> Result<String, RepositoryError> {
    serde_json::to_string(&draft.metadata).map_err(|e| RepositoryError::Query(e.to_string()))
}

fn duplicate_book(draft: &Draft) -> String {
    format!(
        "owner '{}' already has an active draft for book {}",
        draft.owner_id,
        draft.book_id.map(|b| b.to_string()).unwrap_or_default()
    )
}

/// WHERE clause and binds for a filter. Values are bound, never interpolated.
fn filter_clause(filter: &DraftFilter) -> (String, Vec<String>) {
    let mut conditions = vec![CURRENT_SHAPE.to_string()];
    let mut binds = Vec::new();

    if let Some(ref owner) = filter.owner_id {
        conditions.push("owner_id = ?".to_string());
        binds.push(owner.clone());
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?".to_string());
        binds.push(status.to_string());
    }

    (format!(" WHERE {}", conditions.join(" AND ")), binds)
}

impl DraftRepository for SqliteDraftRepository {
    async fn insert(&self, draft: &Draft, audit: &AuditEntry) -> Result<Draft, RepositoryError> {
        let metadata = metadata_json(draft)?;
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        // Owners come from the identity collaborator; register on first write.
        sqlx::query("INSERT OR IGNORE INTO users (id) VALUES (?)")
            .bind(&draft.owner_id)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        sqlx::query(
            "INSERT INTO review_drafts (id, owner_id, book_id, book_data, title, content, metadata, status, version, expires_at, last_accessed_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(draft.id.to_string())
        .bind(&draft.owner_id)
        .bind(draft.book_id.map(|b| b.to_string()))
        .bind(&draft.book_data)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(&metadata)
        .bind(draft.status.to_string())
        .bind(draft.version)
        .bind(format_datetime(&draft.expires_at))
        .bind(format_datetime(&draft.last_accessed_at))
        .bind(format_datetime(&draft.created_at))
        .bind(format_datetime(&draft.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, || duplicate_book(draft)))?;

        insert_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(query_error)?;

        Ok(as_stored(draft))
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Draft>, RepositoryError> {
        let row = self
            .pool
            .timed(
                "draft.get",
                sqlx::query(&format!(
                    "SELECT * FROM review_drafts WHERE id = ? AND {CURRENT_SHAPE}"
                ))
                .bind(id.to_string())
                .fetch_optional(&self.pool.reader),
            )
            .await
            .map_err(query_error)?;

        row.as_ref().map(row_to_draft).transpose()
    }

    async fn list(&self, filter: &DraftFilter) -> Result<Vec<Draft>, RepositoryError> {
        let (clause, binds) = filter_clause(filter);
        let direction = match filter.sort_order.unwrap_or_default() {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let mut sql = format!(
            "SELECT * FROM review_drafts{clause} ORDER BY updated_at {direction}, id {direction}"
        );
        match (filter.limit, filter.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let rows = self
            .pool
            .timed("draft.list", query.fetch_all(&self.pool.reader))
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_draft).collect()
    }

    async fn count(&self, filter: &DraftFilter) -> Result<u64, RepositoryError> {
        let (clause, binds) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM review_drafts{clause}");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let count = query
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;

        Ok(count as u64)
    }

    async fn find_active_for_book(
        &self,
        owner_id: &str,
        book_id: &BookId,
    ) -> Result<Option<Draft>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT * FROM review_drafts WHERE owner_id = ? AND book_id = ? AND status = 'active' AND {CURRENT_SHAPE}"
        ))
        .bind(owner_id)
        .bind(book_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        row.as_ref().map(row_to_draft).transpose()
    }

    async fn compare_and_swap(
        &self,
        updated: &Draft,
        expected: Expected,
        audit: &AuditEntry,
    ) -> Result<CasOutcome, RepositoryError> {
        let metadata = metadata_json(updated)?;
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let result = sqlx::query(
            "UPDATE review_drafts SET book_id = ?, book_data = ?, title = ?, content = ?, metadata = ?, status = ?, version = ?, expires_at = ?, last_accessed_at = ?, updated_at = ?
             WHERE id = ? AND version = ? AND status = ?",
        )
        .bind(updated.book_id.map(|b| b.to_string()))
        .bind(&updated.book_data)
        .bind(&updated.title)
        .bind(&updated.content)
        .bind(&metadata)
        .bind(updated.status.to_string())
        .bind(updated.version)
        .bind(format_datetime(&updated.expires_at))
        .bind(format_datetime(&updated.last_accessed_at))
        .bind(format_datetime(&updated.updated_at))
        .bind(updated.id.to_string())
        .bind(expected.version)
        .bind(expected.status.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, || duplicate_book(updated)))?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(query_error)?;
            let current = self.fetch_current(&updated.id).await?;
            tracing::debug!(
                draft_id = %updated.id,
                expected_version = expected.version,
                current_version = current.as_ref().map(|d| d.version),
                "draft compare-and-swap lost"
            );
            return Ok(CasOutcome::Conflict(current));
        }

        insert_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(query_error)?;

        Ok(CasOutcome::Applied(as_stored(updated)))
    }

    async fn touch_last_accessed(&self, id: &DraftId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "UPDATE review_drafts SET last_accessed_at = ? WHERE id = ? AND {CURRENT_SHAPE}"
        ))
        .bind(format_datetime(&at))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn delete(&self, id: &DraftId, audit: &AuditEntry) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let result = sqlx::query("DELETE FROM review_drafts WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(query_error)?;
            return Ok(false);
        }

        insert_audit(&mut *tx, audit).await?;
        tx.commit().await.map_err(query_error)?;
        Ok(true)
    }

    async fn sync_candidates(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> Result<Vec<Draft>, RepositoryError> {
        let rows = self
            .pool
            .timed(
                "draft.sync_candidates",
                sqlx::query(&format!(
                    "SELECT * FROM review_drafts
                     WHERE status = 'active' AND book_id IS NULL
                       AND book_data IS NOT NULL AND TRIM(book_data) != ''
                       AND id > ? AND {CURRENT_SHAPE}
                     ORDER BY id ASC LIMIT ?"
                ))
                .bind(after.map(|a| a.to_string()).unwrap_or_default())
                .bind(limit)
                .fetch_all(&self.pool.reader),
            )
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_draft).collect()
    }

    async fn count_sync_candidates(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM review_drafts
             WHERE status = 'active' AND book_id IS NULL
               AND book_data IS NOT NULL AND TRIM(book_data) != '' AND {CURRENT_SHAPE}"
        ))
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(count as u64)
    }

    async fn list_expiring(
        &self,
        owner_id: Option<&str>,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Draft>, RepositoryError> {
        let rows = self
            .pool
            .timed(
                "draft.list_expiring",
                sqlx::query(&format!(
                    "SELECT * FROM review_drafts
                     WHERE status = 'active' AND expires_at <= ?
                       AND (? IS NULL OR owner_id = ?) AND {CURRENT_SHAPE}
                     ORDER BY expires_at ASC, id ASC LIMIT ?"
                ))
                .bind(format_datetime(&cutoff))
                .bind(owner_id)
                .bind(owner_id)
                .bind(limit)
                .fetch_all(&self.pool.reader),
            )
            .await
            .map_err(query_error)?;

        rows.iter().map(row_to_draft).collect()
    }
}
