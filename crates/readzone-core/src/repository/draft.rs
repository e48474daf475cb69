//! Draft repository trait definition.

use chrono::{DateTime, Utc};
use readzone_types::audit::AuditEntry;
use readzone_types::book::BookId;
use readzone_types::draft::{Draft, DraftId, DraftStatus};
use readzone_types::error::RepositoryError;

use super::SortOrder;

/// Filter criteria for listing drafts.
#[derive(Debug, Clone, Default)]
pub struct DraftFilter {
    pub owner_id: Option<String>,
    pub status: Option<DraftStatus>,
    /// Direction on `updated_at`. Defaults to newest first.
    pub sort_order: Option<SortOrder>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DraftFilter {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }
}

/// Stored state a compare-and-swap requires before it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expected {
    pub version: i64,
    pub status: DraftStatus,
}

impl Expected {
    pub fn of(draft: &Draft) -> Self {
        Self {
            version: draft.version,
            status: draft.status,
        }
    }
}

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The row matched the expected version and now holds the new state.
    Applied(Draft),
    /// The row moved on. Carries the current state, or `None` if it is gone.
    Conflict(Option<Draft>),
}

/// Repository trait for draft persistence.
///
/// Every state-changing write takes the audit entry describing it and
/// commits both atomically. Only current-shape rows are visible here; legacy
/// rows are the maintenance repository's concern.
pub trait DraftRepository: Send + Sync {
    /// Insert a new draft together with its `Created` audit entry.
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has an
    /// active draft for the same book.
    fn insert(
        &self,
        draft: &Draft,
        audit: &AuditEntry,
    ) -> impl std::future::Future<Output = Result<Draft, RepositoryError>> + Send;

    fn get(
        &self,
        id: &DraftId,
    ) -> impl std::future::Future<Output = Result<Option<Draft>, RepositoryError>> + Send;

    fn list(
        &self,
        filter: &DraftFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Draft>, RepositoryError>> + Send;

    /// Count drafts matching the filter, ignoring limit and offset.
    fn count(
        &self,
        filter: &DraftFilter,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// The owner's Active draft referencing `book_id`, if any.
    fn find_active_for_book(
        &self,
        owner_id: &str,
        book_id: &BookId,
    ) -> impl std::future::Future<Output = Result<Option<Draft>, RepositoryError>> + Send;

    /// Persist `updated` only if the stored row still has the `expected`
    /// version and status, appending `audit` in the same transaction.
    ///
    /// `updated.version` is `expected.version + 1` for every mutation except
    /// the time-driven Active to Expired flip, which keeps the version.
    fn compare_and_swap(
        &self,
        updated: &Draft,
        expected: Expected,
        audit: &AuditEntry,
    ) -> impl std::future::Future<Output = Result<CasOutcome, RepositoryError>> + Send;

    /// Stamp `last_accessed_at`. Bookkeeping only; the version is untouched.
    fn touch_last_accessed(
        &self,
        id: &DraftId,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove the row and append `audit`. Returns false if the row was already gone.
    fn delete(
        &self,
        id: &DraftId,
        audit: &AuditEntry,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Active drafts with book data but no canonical book, ordered by id,
    /// strictly after `after` when given.
    fn sync_candidates(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Draft>, RepositoryError>> + Send;

    fn count_sync_candidates(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Active drafts with `expires_at <= cutoff`, soonest first.
    fn list_expiring(
        &self,
        owner_id: Option<&str>,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Draft>, RepositoryError>> + Send;
}
