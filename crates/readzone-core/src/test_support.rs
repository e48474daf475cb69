//! In-memory port implementations for service tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use readzone_types::audit::{AuditAction, AuditEntry};
use readzone_types::book::{Book, BookId, NewBook, match_key};
use readzone_types::draft::{Draft, DraftId, DraftMetadata, DraftStatus, expiry_from};
use readzone_types::error::RepositoryError;
use readzone_types::maintenance::DraftRecord;

use crate::repository::SortOrder;
use crate::repository::audit::AuditRepository;
use crate::repository::book::BookCatalog;
use crate::repository::checkpoint::CheckpointStore;
use crate::repository::draft::{CasOutcome, DraftFilter, DraftRepository, Expected};
use crate::repository::maintenance::{MaintenanceRepository, OwnerOverLimit, ShapeCounts};

pub(crate) fn sample_draft(owner: &str, now: DateTime<Utc>) -> Draft {
    Draft {
        id: DraftId::new(),
        owner_id: owner.to_string(),
        book_id: None,
        book_data: None,
        title: None,
        content: "<p>A first pass at my thoughts.</p>".to_string(),
        metadata: DraftMetadata::new(),
        status: DraftStatus::Active,
        version: 1,
        expires_at: expiry_from(now, 7),
        last_accessed_at: now,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn with_book_data(mut draft: Draft, title: &str, author: &str) -> Draft {
    draft.book_data = Some(serde_json::json!({ "title": title, "author": author }).to_string());
    draft
}

#[derive(Default)]
struct StoreState {
    drafts: BTreeMap<DraftId, Draft>,
    /// Rows missing the lifecycle columns. Invisible to `DraftRepository`.
    legacy: BTreeMap<DraftId, Draft>,
    audit: Vec<AuditEntry>,
    checkpoints: HashMap<String, String>,
    /// When set, only these owners exist.
    known_owners: Option<HashSet<String>>,
    failing: HashSet<DraftId>,
    optimized: u32,
}

/// Draft, audit, checkpoint and maintenance ports over shared in-memory state.
#[derive(Clone, Default)]
pub(crate) struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn seed(&self, draft: Draft) -> Draft {
        self.lock().drafts.insert(draft.id, draft.clone());
        draft
    }

    pub(crate) fn seed_legacy(&self, draft: Draft) -> DraftId {
        let id = draft.id;
        self.lock().legacy.insert(id, draft);
        id
    }

    pub(crate) fn stored(&self, id: &DraftId) -> Option<Draft> {
        self.lock().drafts.get(id).cloned()
    }

    pub(crate) fn audit_for(&self, id: &DraftId) -> Vec<AuditEntry> {
        self.lock()
            .audit
            .iter()
            .filter(|e| &e.draft_id == id)
            .cloned()
            .collect()
    }

    pub(crate) fn audit_actions(&self, id: &DraftId) -> Vec<AuditAction> {
        self.audit_for(id).into_iter().map(|e| e.action).collect()
    }

    pub(crate) fn all_audit(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    pub(crate) fn checkpoint(&self, job: &str) -> Option<String> {
        self.lock().checkpoints.get(job).cloned()
    }

    /// Writes touching this draft fail with a query error.
    pub(crate) fn fail_writes_for(&self, id: DraftId) {
        self.lock().failing.insert(id);
    }

    pub(crate) fn set_known_owners(&self, owners: &[&str]) {
        self.lock().known_owners = Some(owners.iter().map(|o| o.to_string()).collect());
    }

    pub(crate) fn legacy_count(&self) -> usize {
        self.lock().legacy.len()
    }

    pub(crate) fn optimize_calls(&self) -> u32 {
        self.lock().optimized
    }

    fn owner_exists(state: &StoreState, owner: &str) -> bool {
        state
            .known_owners
            .as_ref()
            .is_none_or(|owners| owners.contains(owner))
    }

    fn current_record(state: &StoreState, draft: &Draft) -> DraftRecord {
        DraftRecord {
            id: draft.id,
            owner_id: draft.owner_id.clone(),
            book_id: draft.book_id,
            status: Some(draft.status.to_string()),
            version: Some(draft.version),
            expires_at: Some(draft.expires_at),
            last_accessed_at: Some(draft.last_accessed_at),
            updated_at: draft.updated_at,
            owner_exists: Self::owner_exists(state, &draft.owner_id),
            book_exists: true,
        }
    }

    fn legacy_record(state: &StoreState, draft: &Draft) -> DraftRecord {
        DraftRecord {
            id: draft.id,
            owner_id: draft.owner_id.clone(),
            book_id: draft.book_id,
            status: None,
            version: None,
            expires_at: None,
            last_accessed_at: None,
            updated_at: draft.updated_at,
            owner_exists: Self::owner_exists(state, &draft.owner_id),
            book_exists: true,
        }
    }

    fn matches(filter: &DraftFilter, draft: &Draft) -> bool {
        filter.owner_id.as_ref().is_none_or(|o| o == &draft.owner_id)
            && filter.status.is_none_or(|s| s == draft.status)
    }
}

impl DraftRepository for InMemoryStore {
    async fn insert(&self, draft: &Draft, audit: &AuditEntry) -> Result<Draft, RepositoryError> {
        let mut state = self.lock();
        if let Some(book_id) = draft.book_id {
            let duplicate = state.drafts.values().any(|d| {
                d.owner_id == draft.owner_id && d.book_id == Some(book_id) && d.status.is_active()
            });
            if duplicate {
                return Err(RepositoryError::Conflict("active draft exists".to_string()));
            }
        }
        state.drafts.insert(draft.id, draft.clone());
        state.audit.push(audit.clone());
        Ok(draft.clone())
    }

    async fn get(&self, id: &DraftId) -> Result<Option<Draft>, RepositoryError> {
        Ok(self.lock().drafts.get(id).cloned())
    }

    async fn list(&self, filter: &DraftFilter) -> Result<Vec<Draft>, RepositoryError> {
        let state = self.lock();
        let mut drafts: Vec<Draft> = state
            .drafts
            .values()
            .filter(|d| Self::matches(filter, d))
            .cloned()
            .collect();
        drafts.sort_by_key(|d| (d.updated_at, d.id));
        if filter.sort_order.unwrap_or_default() == SortOrder::Desc {
            drafts.reverse();
        }
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(drafts.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &DraftFilter) -> Result<u64, RepositoryError> {
        let state = self.lock();
        Ok(state.drafts.values().filter(|d| Self::matches(filter, d)).count() as u64)
    }

    async fn find_active_for_book(
        &self,
        owner_id: &str,
        book_id: &BookId,
    ) -> Result<Option<Draft>, RepositoryError> {
        Ok(self
            .lock()
            .drafts
            .values()
            .find(|d| d.owner_id == owner_id && d.book_id == Some(*book_id) && d.status.is_active())
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        updated: &Draft,
        expected: Expected,
        audit: &AuditEntry,
    ) -> Result<CasOutcome, RepositoryError> {
        let mut state = self.lock();
        if state.failing.contains(&updated.id) {
            return Err(RepositoryError::Query("injected write failure".to_string()));
        }
        match state.drafts.get(&updated.id) {
            Some(current) if Expected::of(current) == expected => {
                state.drafts.insert(updated.id, updated.clone());
                state.audit.push(audit.clone());
                Ok(CasOutcome::Applied(updated.clone()))
            }
            Some(current) => Ok(CasOutcome::Conflict(Some(current.clone()))),
            None => Ok(CasOutcome::Conflict(None)),
        }
    }

    async fn touch_last_accessed(&self, id: &DraftId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(draft) = self.lock().drafts.get_mut(id) {
            draft.last_accessed_at = at;
        }
        Ok(())
    }

    async fn delete(&self, id: &DraftId, audit: &AuditEntry) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let removed = state.drafts.remove(id).is_some();
        if removed {
            state.audit.push(audit.clone());
        }
        Ok(removed)
    }

    async fn sync_candidates(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> Result<Vec<Draft>, RepositoryError> {
        Ok(self
            .lock()
            .drafts
            .values()
            .filter(|d| after.is_none_or(|a| d.id > *a))
            .filter(|d| d.status.is_active() && d.needs_book_sync())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_sync_candidates(&self) -> Result<u64, RepositoryError> {
        Ok(self
            .lock()
            .drafts
            .values()
            .filter(|d| d.status.is_active() && d.needs_book_sync())
            .count() as u64)
    }

    async fn list_expiring(
        &self,
        owner_id: Option<&str>,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Draft>, RepositoryError> {
        let state = self.lock();
        let mut drafts: Vec<Draft> = state
            .drafts
            .values()
            .filter(|d| d.status.is_active() && d.expires_at <= cutoff)
            .filter(|d| owner_id.is_none_or(|o| o == d.owner_id))
            .cloned()
            .collect();
        drafts.sort_by_key(|d| (d.expires_at, d.id));
        drafts.truncate(limit as usize);
        Ok(drafts)
    }
}

impl AuditRepository for InMemoryStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), RepositoryError> {
        self.lock().audit.push(entry.clone());
        Ok(())
    }

    async fn list_for_draft(
        &self,
        draft_id: &DraftId,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let mut entries = self.audit_for(draft_id);
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit as usize);
        }
        Ok(entries)
    }

    async fn count_by_action_since(
        &self,
        action: AuditAction,
        since: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .lock()
            .audit
            .iter()
            .filter(|e| e.action == action && e.occurred_at >= since)
            .count() as u64)
    }

    async fn last_occurred(&self, action: AuditAction) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .lock()
            .audit
            .iter()
            .filter(|e| e.action == action)
            .map(|e| e.occurred_at)
            .max())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.lock().audit.len() as u64)
    }

    async fn count_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Ok(self
            .lock()
            .audit
            .iter()
            .filter(|e| e.occurred_at < cutoff)
            .count() as u64)
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut state = self.lock();
        let before = state.audit.len();
        state.audit.retain(|e| e.occurred_at >= cutoff);
        Ok((before - state.audit.len()) as u64)
    }
}

impl CheckpointStore for InMemoryStore {
    async fn load(&self, job: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.lock().checkpoints.get(job).cloned())
    }

    async fn save(&self, job: &str, cursor: &str) -> Result<(), RepositoryError> {
        self.lock()
            .checkpoints
            .insert(job.to_string(), cursor.to_string());
        Ok(())
    }

    async fn clear(&self, job: &str) -> Result<(), RepositoryError> {
        self.lock().checkpoints.remove(job);
        Ok(())
    }
}

impl MaintenanceRepository for InMemoryStore {
    async fn shape_counts(&self, now: DateTime<Utc>) -> Result<ShapeCounts, RepositoryError> {
        let state = self.lock();
        Ok(ShapeCounts {
            total: (state.drafts.len() + state.legacy.len()) as u64,
            current_shape: state.drafts.len() as u64,
            expired: state.drafts.values().filter(|d| d.expires_at < now).count() as u64,
        })
    }

    async fn scan_records(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> Result<Vec<DraftRecord>, RepositoryError> {
        let state = self.lock();
        let mut records: Vec<DraftRecord> = state
            .drafts
            .values()
            .map(|d| Self::current_record(&state, d))
            .chain(state.legacy.values().map(|d| Self::legacy_record(&state, d)))
            .filter(|r| after.is_none_or(|a| r.id > *a))
            .collect();
        records.sort_by_key(|r| r.id);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn legacy_records(
        &self,
        after: Option<&DraftId>,
        limit: i64,
    ) -> Result<Vec<DraftRecord>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .legacy
            .values()
            .filter(|d| after.is_none_or(|a| d.id > *a))
            .take(limit as usize)
            .map(|d| Self::legacy_record(&state, d))
            .collect())
    }

    async fn upgrade_record(
        &self,
        id: &DraftId,
        expires_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        if state.failing.contains(id) {
            return Err(RepositoryError::Query("injected write failure".to_string()));
        }
        let Some(mut draft) = state.legacy.remove(id) else {
            return Ok(false);
        };
        draft.status = DraftStatus::Active;
        draft.version = 1;
        draft.expires_at = expires_at;
        draft.last_accessed_at = last_accessed_at;
        state.drafts.insert(draft.id, draft);
        Ok(true)
    }

    async fn downgrade_batch(&self, limit: i64) -> Result<u64, RepositoryError> {
        let mut state = self.lock();
        let ids: Vec<DraftId> = state.drafts.keys().take(limit as usize).copied().collect();
        for id in &ids {
            if let Some(draft) = state.drafts.remove(id) {
                state.legacy.insert(*id, draft);
            }
        }
        Ok(ids.len() as u64)
    }

    async fn retired_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Draft>, RepositoryError> {
        Ok(self
            .lock()
            .drafts
            .values()
            .filter(|d| DraftStatus::RETIRED.contains(&d.status) && d.updated_at < cutoff)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn owners_over_limit(&self, max_active: u64) -> Result<Vec<OwnerOverLimit>, RepositoryError> {
        let state = self.lock();
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for draft in state.drafts.values().filter(|d| d.status.is_active()) {
            *counts.entry(draft.owner_id.clone()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .filter(|(_, n)| *n > max_active)
            .map(|(owner_id, active_drafts)| OwnerOverLimit {
                owner_id,
                active_drafts,
            })
            .collect())
    }

    async fn orphaned_records(&self, limit: i64) -> Result<Vec<DraftRecord>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .drafts
            .values()
            .map(|d| Self::current_record(&state, d))
            .chain(state.legacy.values().map(|d| Self::legacy_record(&state, d)))
            .filter(|r| !r.owner_exists)
            .take(limit as usize)
            .collect())
    }

    async fn remove_record(&self, id: &DraftId) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        Ok(state.drafts.remove(id).is_some() || state.legacy.remove(id).is_some())
    }

    async fn optimize(&self) -> Result<(), RepositoryError> {
        self.lock().optimized += 1;
        Ok(())
    }
}

/// Book catalog with optional lookup latency and injected failures.
#[derive(Clone, Default)]
pub(crate) struct InMemoryCatalog {
    books: Arc<Mutex<Vec<Book>>>,
    delay: Option<StdDuration>,
    failing_titles: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn add(&self, title: &str, author: &str) -> Book {
        let book = Book {
            id: BookId::new(),
            title: title.to_string(),
            authors: vec![author.to_string()],
            isbn13: None,
            publisher: None,
            thumbnail: None,
            created_at: Utc::now(),
        };
        self.books.lock().unwrap().push(book.clone());
        book
    }

    /// Lookups for this title fail with a query error.
    pub(crate) fn fail_lookups_for(&self, title: &str) {
        self.failing_titles.lock().unwrap().insert(match_key(title));
    }

    pub(crate) fn len(&self) -> usize {
        self.books.lock().unwrap().len()
    }
}

impl BookCatalog for InMemoryCatalog {
    async fn find_exact(&self, title_key: &str, author_key: &str) -> Result<Vec<Book>, RepositoryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_titles.lock().unwrap().contains(title_key) {
            return Err(RepositoryError::Query("catalog unavailable".to_string()));
        }
        Ok(self
            .books
            .lock()
            .unwrap()
            .iter()
            .filter(|b| {
                match_key(&b.title) == title_key
                    && b.authors.first().is_some_and(|a| match_key(a) == author_key)
            })
            .cloned()
            .collect())
    }

    async fn get(&self, id: &BookId) -> Result<Option<Book>, RepositoryError> {
        Ok(self.books.lock().unwrap().iter().find(|b| &b.id == id).cloned())
    }

    async fn create(&self, book: &NewBook) -> Result<Book, RepositoryError> {
        let created = Book {
            id: BookId::new(),
            title: book.title.clone(),
            authors: book.authors.clone(),
            isbn13: book.isbn13.clone(),
            publisher: book.publisher.clone(),
            thumbnail: book.thumbnail.clone(),
            created_at: Utc::now(),
        };
        self.books.lock().unwrap().push(created.clone());
        Ok(created)
    }
}
