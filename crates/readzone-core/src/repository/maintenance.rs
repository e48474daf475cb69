//! Maintenance repository trait definition.
//!
//! The only port allowed to see legacy-shaped rows or change row shape.

use chrono::{DateTime, Utc};
use readzone_types::draft::{Draft, DraftId};
use readzone_types::error::RepositoryError;
use readzone_types::maintenance::DraftRecord;

/// Row counts by shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeCounts {
    pub total: u64,
    pub current_shape: u64,
    /// Rows whose `expires_at` is before the given instant.
    pub expired: u64,
}

/// An owner holding more Active drafts than allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerOverLimit {
    pub owner_id: String,
    pub active_drafts: u64,
}

pub trait MaintenanceRepository: Send + Sync {
    fn shape_counts(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<ShapeCounts, RepositoryError>> + Send;

    /// All rows, any shape, ordered by id, strictly after `after`.
    fn scan_records(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<DraftRecord>, RepositoryError>> + Send;

    /// Rows missing at least one lifecycle column, ordered by id, strictly after `after`.
    fn legacy_records(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<DraftRecord>, RepositoryError>> + Send;

    /// Fill the lifecycle columns of one legacy row: Active, version 1 and
    /// the given timestamps. Returns false if the row is no longer legacy.
    fn upgrade_record(
        &self,
        id: &DraftId,
        expires_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Null the lifecycle columns of up to `limit` current-shape rows.
    /// Returns the number of rows reverted; zero means nothing is left.
    fn downgrade_batch(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Expired or Abandoned drafts last updated before `cutoff`.
    fn retired_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Draft>, RepositoryError>> + Send;

    fn owners_over_limit(
        &self,
        max_active: u64,
    ) -> impl std::future::Future<Output = Result<Vec<OwnerOverLimit>, RepositoryError>> + Send;

    /// Rows whose owner no longer exists.
    fn orphaned_records(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<DraftRecord>, RepositoryError>> + Send;

    /// Remove a row regardless of shape. Returns false if it was already gone.
    fn remove_record(
        &self,
        id: &DraftId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Ask the store to refresh index statistics.
    fn optimize(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
