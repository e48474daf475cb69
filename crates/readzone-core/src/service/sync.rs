//! Book synchronization engine.
//!
//! Matches a draft's informal book data against the catalog on the exact
//! (title, first author) pair and relinks the draft with a compare-and-swap.
//! Two entry points share the matching core:
//!
//! - [`BookSyncEngine::sync_draft_book`]: one draft, called from the save path.
//! - [`BookSyncEngine::batch_sync_drafts`]: scheduled sweep over sync
//!   candidates in bounded sub-batches, checkpointed and cancellable.
//!
//! The engine never guesses: several matching books is `Ambiguous`, and a
//! lookup that overruns its time budget is `TimedOut`. Both leave the draft
//! unlinked for a later attempt.

use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use readzone_types::audit::{AuditAction, AuditEntry, SYSTEM_ACTOR};
use readzone_types::book::{BookData, BookId, NewBook, match_key};
use readzone_types::config::SyncConfig;
use readzone_types::draft::{Draft, DraftId};
use readzone_types::error::{RepositoryError, SyncError};
use readzone_types::sync::{BatchSyncReport, SyncConfidence, SyncMetrics, SyncOutcome, SyncResult};
use tokio_util::sync::CancellationToken;

use crate::clock::SharedClock;
use crate::repository::audit::AuditRepository;
use crate::repository::book::BookCatalog;
use crate::repository::checkpoint::CheckpointStore;
use crate::repository::draft::{CasOutcome, DraftRepository, Expected};
use crate::service::lifecycle::{expire_if_due, next_version};
use crate::service::validation::validate_book_data;

/// Checkpoint key for the batch sweep.
pub const BATCH_SYNC_JOB: &str = "book_sync";

/// Options for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSyncOptions {
    /// Maximum candidates to process. Defaults to `sync.candidate_limit`.
    pub limit: Option<usize>,
    /// Sub-batch size, clamped to `sync.max_batch_size`.
    pub batch_size: Option<usize>,
    /// Ignore and discard any saved checkpoint.
    pub fresh: bool,
}

/// How a match attempt was resolved, before the link write.
enum MatchDecision {
    Link(BookId, &'static str),
    Skip(SyncOutcome),
}

pub struct BookSyncEngine<D, A, C, K>
where
    D: DraftRepository,
    A: AuditRepository,
    C: BookCatalog,
    K: CheckpointStore,
{
    drafts: D,
    audit: A,
    catalog: C,
    checkpoints: K,
    config: SyncConfig,
    clock: SharedClock,
}

impl<D, A, C, K> BookSyncEngine<D, A, C, K>
where
    D: DraftRepository,
    A: AuditRepository,
    C: BookCatalog,
    K: CheckpointStore,
{
    pub fn new(
        drafts: D,
        audit: A,
        catalog: C,
        checkpoints: K,
        config: SyncConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            drafts,
            audit,
            catalog,
            checkpoints,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync a single draft.
    ///
    /// `confidence` decides, together with the auto-create policy, whether
    /// an unmatched book may be created in the catalog.
    pub async fn sync_draft_book(
        &self,
        id: &DraftId,
        confidence: SyncConfidence,
    ) -> Result<SyncResult, SyncError> {
        let draft = self.drafts.get(id).await?.ok_or(SyncError::DraftNotFound)?;
        let result = self.sync_loaded(draft, confidence).await?;

        tracing::info!(
            draft_id = %id,
            outcome = result.outcome.label(),
            version = result.version,
            "inline book sync"
        );
        Ok(result)
    }

    /// Sweep sync candidates in sub-batches.
    ///
    /// Per-draft failures are collected in the report. Only a failure to
    /// read candidates or write the checkpoint aborts the run. Cancellation
    /// is honoured between sub-batches, leaving the checkpoint at the last
    /// completed one.
    pub async fn batch_sync_drafts(
        &self,
        options: BatchSyncOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchSyncReport, SyncError> {
        let started = Instant::now();
        let limit = options.limit.unwrap_or(self.config.candidate_limit);
        let batch_size = self.config.effective_batch_size(options.batch_size);

        let mut cursor = if options.fresh {
            self.checkpoints.clear(BATCH_SYNC_JOB).await?;
            None
        } else {
            self.load_cursor().await?
        };

        let mut report = BatchSyncReport {
            resumed_from: cursor,
            ..Default::default()
        };
        let mut exhausted = false;

        while report.processed < limit {
            if cancel.is_cancelled() {
                report.interrupted = true;
                tracing::warn!(processed = report.processed, "batch sync cancelled");
                break;
            }

            let take = batch_size.min(limit - report.processed);
            let candidates = self
                .drafts
                .sync_candidates(cursor.as_ref(), take as i64)
                .await?;
            let fetched = candidates.len();
            let Some(last) = candidates.last().map(|d| d.id) else {
                exhausted = true;
                break;
            };

            for draft in candidates {
                let id = draft.id;
                let result = self
                    .sync_loaded(draft, SyncConfidence::Unconfirmed)
                    .await
                    .map_err(|e| e.to_string());
                if let Err(error) = &result {
                    tracing::warn!(draft_id = %id, %error, "book sync failed for draft");
                }
                report.record(id, result);
            }

            cursor = Some(last);
            self.checkpoints
                .save(BATCH_SYNC_JOB, &last.to_string())
                .await?;
            tracing::debug!(cursor = %last, fetched, "sync sub-batch complete");

            if fetched < take {
                exhausted = true;
                break;
            }
        }

        if exhausted {
            self.checkpoints.clear(BATCH_SYNC_JOB).await?;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            processed = report.processed,
            synced = report.synced,
            no_match = report.no_match,
            ambiguous = report.ambiguous,
            failed = report.failed,
            interrupted = report.interrupted,
            duration_ms = report.duration_ms,
            "batch book sync finished"
        );
        Ok(report)
    }

    /// Sync activity over the trailing window.
    pub async fn sync_metrics(&self, window_hours: i64) -> Result<SyncMetrics, SyncError> {
        let since = self.clock.now() - ChronoDuration::hours(window_hours);
        Ok(SyncMetrics {
            window_hours,
            synced_in_window: self
                .audit
                .count_by_action_since(AuditAction::BookSynced, since)
                .await?,
            last_synced_at: self.audit.last_occurred(AuditAction::BookSynced).await?,
            pending_candidates: self.drafts.count_sync_candidates().await?,
        })
    }

    async fn load_cursor(&self) -> Result<Option<DraftId>, SyncError> {
        let Some(raw) = self.checkpoints.load(BATCH_SYNC_JOB).await? else {
            return Ok(None);
        };
        match raw.parse::<DraftId>() {
            Ok(id) => {
                tracing::info!(cursor = %id, "resuming batch sync from checkpoint");
                Ok(Some(id))
            }
            Err(e) => {
                tracing::warn!(cursor = %raw, error = %e, "ignoring unreadable sync checkpoint");
                Ok(None)
            }
        }
    }

    async fn sync_loaded(
        &self,
        draft: Draft,
        confidence: SyncConfidence,
    ) -> Result<SyncResult, SyncError> {
        let draft = expire_if_due(&self.drafts, draft, self.clock.now()).await?;
        let version = draft.version;
        let skip = |outcome| SyncResult {
            draft_id: draft.id,
            outcome,
            version,
        };

        if !draft.status.is_active() {
            return Ok(skip(SyncOutcome::NotEligible {
                status: draft.status,
            }));
        }
        if let Some(book_id) = draft.book_id {
            return Ok(skip(SyncOutcome::AlreadyLinked { book_id }));
        }
        let Some(raw) = draft.book_data.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Ok(skip(SyncOutcome::NoBookData));
        };
        let data = match validate_book_data(raw) {
            Ok(data) => data,
            Err(e) => {
                return Ok(skip(SyncOutcome::InvalidBookData {
                    reason: e.to_string(),
                }));
            }
        };

        match self.decide(&draft, &data, confidence).await? {
            MatchDecision::Skip(outcome) => Ok(skip(outcome)),
            MatchDecision::Link(book_id, how) => self.link(&draft, book_id, how).await,
        }
    }

    async fn decide(
        &self,
        draft: &Draft,
        data: &BookData,
        confidence: SyncConfidence,
    ) -> Result<MatchDecision, SyncError> {
        let budget = Duration::from_millis(self.config.lookup_timeout_ms);

        let candidates = match data.first_author() {
            Some(author) => {
                let title_key = match_key(&data.title);
                let author_key = match_key(author);
                let lookup = self.catalog.find_exact(&title_key, &author_key);
                match tokio::time::timeout(budget, lookup).await {
                    Ok(found) => found.map_err(catalog_error)?,
                    Err(_) => {
                        tracing::warn!(
                            draft_id = %draft.id,
                            timeout_ms = self.config.lookup_timeout_ms,
                            "catalog lookup timed out"
                        );
                        return Ok(MatchDecision::Skip(SyncOutcome::TimedOut));
                    }
                }
            }
            None => Vec::new(),
        };

        match candidates.as_slice() {
            [book] => Ok(MatchDecision::Link(book.id, "exact")),
            [] => {
                if !self
                    .config
                    .auto_create
                    .allows(confidence, data.isbn13().is_some())
                {
                    return Ok(MatchDecision::Skip(SyncOutcome::NoMatch));
                }
                let new_book = NewBook::from(data);
                let create = self.catalog.create(&new_book);
                match tokio::time::timeout(budget, create).await {
                    Ok(created) => {
                        let book = created.map_err(catalog_error)?;
                        tracing::info!(book_id = %book.id, title = %book.title, "created canonical book");
                        Ok(MatchDecision::Link(book.id, "created"))
                    }
                    Err(_) => Ok(MatchDecision::Skip(SyncOutcome::TimedOut)),
                }
            }
            many => {
                tracing::debug!(draft_id = %draft.id, candidates = many.len(), "ambiguous book match");
                Ok(MatchDecision::Skip(SyncOutcome::Ambiguous {
                    candidates: many.len(),
                }))
            }
        }
    }

    /// Point the draft at `book_id`, touching nothing but the link and version.
    async fn link(
        &self,
        draft: &Draft,
        book_id: BookId,
        how: &'static str,
    ) -> Result<SyncResult, SyncError> {
        let now = self.clock.now();
        let mut linked = next_version(draft, now);
        linked.book_id = Some(book_id);

        let details = serde_json::json!({
            "previous_book_id": draft.book_id,
            "book_id": book_id,
            "match": how,
        });
        let audit = AuditEntry::record(
            draft.id,
            SYSTEM_ACTOR,
            AuditAction::BookSynced,
            Some(draft),
            Some(&linked),
            now,
        )
        .with_details(details);

        match self
            .drafts
            .compare_and_swap(&linked, Expected::of(draft), &audit)
            .await?
        {
            CasOutcome::Applied(stored) => {
                let outcome = if how == "created" {
                    SyncOutcome::Created { book_id }
                } else {
                    SyncOutcome::Linked { book_id }
                };
                Ok(SyncResult {
                    draft_id: stored.id,
                    outcome,
                    version: stored.version,
                })
            }
            CasOutcome::Conflict(Some(current)) => {
                let conflict = AuditEntry::record(
                    draft.id,
                    SYSTEM_ACTOR,
                    AuditAction::BookSynced,
                    Some(draft),
                    None,
                    now,
                )
                .with_details(serde_json::json!({
                    "error": "version_conflict",
                    "book_id": book_id,
                    "expected_version": draft.version,
                    "current_version": current.version,
                }));
                self.audit.append(&conflict).await?;
                tracing::debug!(draft_id = %draft.id, "sync lost the version race");
                Ok(SyncResult {
                    draft_id: current.id,
                    outcome: SyncOutcome::Conflict,
                    version: current.version,
                })
            }
            CasOutcome::Conflict(None) => Err(SyncError::DraftNotFound),
        }
    }
}

fn catalog_error(err: RepositoryError) -> SyncError {
    SyncError::Catalog(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use readzone_types::draft::DraftStatus;
    use readzone_types::sync::AutoCreatePolicy;

    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::{InMemoryCatalog, InMemoryStore, sample_draft, with_book_data};

    type Engine = BookSyncEngine<InMemoryStore, InMemoryStore, InMemoryCatalog, InMemoryStore>;

    fn engine_with(store: &InMemoryStore, catalog: &InMemoryCatalog, config: SyncConfig) -> Engine {
        BookSyncEngine::new(
            store.clone(),
            store.clone(),
            catalog.clone(),
            store.clone(),
            config,
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn engine(store: &InMemoryStore, catalog: &InMemoryCatalog) -> Engine {
        engine_with(store, catalog, SyncConfig::default())
    }

    fn seed_candidate(store: &InMemoryStore, title: &str, author: &str) -> Draft {
        store.seed(with_book_data(sample_draft("user-1", Utc::now()), title, author))
    }

    #[tokio::test]
    async fn test_batch_links_exact_match() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        let book = catalog.add("Foo", "Bar");
        let draft = seed_candidate(&store, "Foo", "Bar");

        let report = engine(&store, &catalog)
            .batch_sync_drafts(BatchSyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.synced, 1);
        let stored = store.stored(&draft.id).unwrap();
        assert_eq!(stored.book_id, Some(book.id));
        assert_eq!(stored.version, draft.version + 1);
        assert_eq!(stored.content, draft.content);

        let audit = store.audit_for(&draft.id);
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::BookSynced);
        assert!(audit[0].before().unwrap().book_id.is_none());
        assert_eq!(audit[0].after().unwrap().book_id, Some(book.id));
    }

    #[tokio::test]
    async fn test_match_ignores_case_and_spacing() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        let book = catalog.add("The Little Prince", "Antoine de Saint-Exupery");
        let draft = seed_candidate(&store, "  the little  PRINCE", "antoine de saint-exupery ");

        let result = engine(&store, &catalog)
            .sync_draft_book(&draft.id, SyncConfidence::Unconfirmed)
            .await
            .unwrap();
        assert_eq!(result.outcome, SyncOutcome::Linked { book_id: book.id });
    }

    #[tokio::test]
    async fn test_k_of_n_with_injected_failures() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        for i in 0..4 {
            catalog.add(&format!("Known {i}"), "Author");
        }

        let mut matchable = Vec::new();
        for i in 0..4 {
            matchable.push(seed_candidate(&store, &format!("Known {i}"), "Author").id);
        }
        for i in 0..5 {
            seed_candidate(&store, &format!("Unknown {i}"), "Author");
        }
        let mut broken = sample_draft("user-1", Utc::now());
        broken.book_data = Some("{\"oops\":".to_string());
        store.seed(broken);
        let failing = seed_candidate(&store, "Unknown catalog outage", "Author");
        catalog.fail_lookups_for("Unknown catalog outage");

        let report = engine(&store, &catalog)
            .batch_sync_drafts(BatchSyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.processed, 11);
        assert_eq!(report.synced, 4);
        assert_eq!(report.no_match, 5);
        assert_eq!(report.failed, 2);
        assert!(report.errors.iter().any(|e| e.draft_id == failing.id));

        let linked = matchable
            .iter()
            .filter(|id| store.stored(id).unwrap().book_id.is_some())
            .count();
        assert_eq!(linked, 4);
        let synced_entries = store
            .all_audit()
            .into_iter()
            .filter(|e| e.action == AuditAction::BookSynced)
            .count();
        assert_eq!(synced_entries, 4);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_block_sub_batch() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.add("Foo", "Bar");
        catalog.add("Baz", "Qux");
        let bad = seed_candidate(&store, "Foo", "Bar");
        let good = seed_candidate(&store, "Baz", "Qux");
        store.fail_writes_for(bad.id);

        let report = engine(&store, &catalog)
            .batch_sync_drafts(BatchSyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 1);
        assert!(store.stored(&good.id).unwrap().book_id.is_some());
    }

    #[tokio::test]
    async fn test_ambiguous_match_is_not_resolved() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.add("Foo", "Bar");
        catalog.add("foo", "bar");
        let draft = seed_candidate(&store, "Foo", "Bar");

        let result = engine(&store, &catalog)
            .sync_draft_book(&draft.id, SyncConfidence::Confirmed)
            .await
            .unwrap();
        assert_eq!(result.outcome, SyncOutcome::Ambiguous { candidates: 2 });
        assert!(store.stored(&draft.id).unwrap().book_id.is_none());
        assert!(store.audit_for(&draft.id).is_empty());
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_auto_create_follows_policy() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        let draft = seed_candidate(&store, "Brand New", "Debut Author");

        let unconfirmed = engine(&store, &catalog)
            .sync_draft_book(&draft.id, SyncConfidence::Unconfirmed)
            .await
            .unwrap();
        assert_eq!(unconfirmed.outcome, SyncOutcome::NoMatch);

        let never = SyncConfig {
            auto_create: AutoCreatePolicy::Never,
            ..Default::default()
        };
        let refused = engine_with(&store, &catalog, never)
            .sync_draft_book(&draft.id, SyncConfidence::Confirmed)
            .await
            .unwrap();
        assert_eq!(refused.outcome, SyncOutcome::NoMatch);
        assert_eq!(catalog.len(), 0);

        let created = engine(&store, &catalog)
            .sync_draft_book(&draft.id, SyncConfidence::Confirmed)
            .await
            .unwrap();
        assert!(matches!(created.outcome, SyncOutcome::Created { .. }));
        assert_eq!(catalog.len(), 1);
        assert_eq!(store.stored(&draft.id).unwrap().book_id, created.book_id());
    }

    #[tokio::test]
    async fn test_already_linked_is_never_rematched() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.add("Foo", "Bar");
        let mut draft = with_book_data(sample_draft("user-1", Utc::now()), "Foo", "Bar");
        let existing = BookId::new();
        draft.book_id = Some(existing);
        store.seed(draft.clone());

        let result = engine(&store, &catalog)
            .sync_draft_book(&draft.id, SyncConfidence::Confirmed)
            .await
            .unwrap();
        assert_eq!(result.outcome, SyncOutcome::AlreadyLinked { book_id: existing });
        assert_eq!(result.version, draft.version);
    }

    #[tokio::test]
    async fn test_non_active_draft_not_synced() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.add("Foo", "Bar");
        let mut draft = with_book_data(sample_draft("user-1", Utc::now()), "Foo", "Bar");
        draft.status = DraftStatus::Abandoned;
        store.seed(draft.clone());

        let result = engine(&store, &catalog)
            .sync_draft_book(&draft.id, SyncConfidence::Unconfirmed)
            .await
            .unwrap();
        assert_eq!(
            result.outcome,
            SyncOutcome::NotEligible {
                status: DraftStatus::Abandoned
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_times_out_without_failing_batch() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new().with_delay(Duration::from_secs(5));
        catalog.add("Foo", "Bar");
        let draft = seed_candidate(&store, "Foo", "Bar");

        let report = engine(&store, &catalog)
            .batch_sync_drafts(BatchSyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.failed, 0);
        assert!(store.stored(&draft.id).unwrap().book_id.is_none());
    }

    #[tokio::test]
    async fn test_limit_checkpoints_and_resumes() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        for _ in 0..5 {
            seed_candidate(&store, "Nothing", "Matches");
        }
        let engine = engine(&store, &catalog);
        let cancel = CancellationToken::new();

        let first = engine
            .batch_sync_drafts(
                BatchSyncOptions {
                    limit: Some(3),
                    batch_size: Some(2),
                    fresh: false,
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(first.processed, 3);
        let saved = store.checkpoint(BATCH_SYNC_JOB).unwrap();

        let second = engine
            .batch_sync_drafts(BatchSyncOptions::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(second.resumed_from.map(|id| id.to_string()), Some(saved));
        assert_eq!(second.processed, 2);
        assert!(store.checkpoint(BATCH_SYNC_JOB).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_next_sub_batch() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        for _ in 0..3 {
            seed_candidate(&store, "Nothing", "Matches");
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine(&store, &catalog)
            .batch_sync_drafts(BatchSyncOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(report.interrupted);
        assert_eq!(report.processed, 0);
    }

    #[tokio::test]
    async fn test_sync_metrics_counts_window() {
        let store = InMemoryStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.add("Foo", "Bar");
        seed_candidate(&store, "Foo", "Bar");
        seed_candidate(&store, "Unmatched", "Bar");
        let engine = engine(&store, &catalog);
        engine
            .batch_sync_drafts(BatchSyncOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        let metrics = engine.sync_metrics(24).await.unwrap();
        assert_eq!(metrics.synced_in_window, 1);
        assert!(metrics.last_synced_at.is_some());
        assert_eq!(metrics.pending_candidates, 1);
    }
}
