//! Audit trail repository trait definition.

use chrono::{DateTime, Utc};
use readzone_types::audit::{AuditAction, AuditEntry};
use readzone_types::draft::DraftId;
use readzone_types::error::RepositoryError;

/// Append-only store for draft audit entries.
///
/// Entries are never updated. The only removal path is age-based pruning
/// by operator tooling.
pub trait AuditRepository: Send + Sync {
    fn append(
        &self,
        entry: &AuditEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Entries for one draft, newest first.
    fn list_for_draft(
        &self,
        draft_id: &DraftId,
        limit: Option<i64>,
    ) -> impl std::future::Future<Output = Result<Vec<AuditEntry>, RepositoryError>> + Send;

    fn count_by_action_since(
        &self,
        action: AuditAction,
        since: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// When `action` last happened to any draft.
    fn last_occurred(
        &self,
        action: AuditAction,
    ) -> impl std::future::Future<Output = Result<Option<DateTime<Utc>>, RepositoryError>> + Send;

    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count entries older than `cutoff` without removing them.
    fn count_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Remove entries older than `cutoff`. Returns the number removed.
    fn prune_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
