//! End-to-end checks of the draft services over a real SQLite store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use readzone_core::clock::{Clock, ManualClock, SharedClock};
use readzone_core::repository::audit::AuditRepository;
use readzone_core::repository::book::BookCatalog;
use readzone_core::repository::checkpoint::CheckpointStore;
use readzone_core::service::draft::DraftService;
use readzone_core::service::maintenance::DraftMaintenance;
use readzone_core::service::sync::{BATCH_SYNC_JOB, BatchSyncOptions, BookSyncEngine};
use readzone_infra::sqlite::audit::SqliteAuditRepository;
use readzone_infra::sqlite::book::SqliteBookCatalog;
use readzone_infra::sqlite::checkpoint::SqliteCheckpointStore;
use readzone_infra::sqlite::draft::SqliteDraftRepository;
use readzone_infra::sqlite::maintenance::SqliteMaintenanceRepository;
use readzone_infra::sqlite::pool::{DatabasePool, database_url};
use readzone_types::audit::AuditAction;
use readzone_types::book::NewBook;
use readzone_types::config::{DraftsConfig, MaintenanceConfig, SyncConfig};
use readzone_types::draft::{CreateDraftRequest, DraftPatch, DraftStatus};
use readzone_types::error::DraftError;
use tokio_util::sync::CancellationToken;

struct Harness {
    pool: DatabasePool,
    clock: ManualClock,
    drafts: DraftService<SqliteDraftRepository, SqliteAuditRepository>,
    sync: BookSyncEngine<SqliteDraftRepository, SqliteAuditRepository, SqliteBookCatalog, SqliteCheckpointStore>,
    catalog: SqliteBookCatalog,
    audit: SqliteAuditRepository,
    _dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
    let clock = ManualClock::new(Utc::now());
    let shared: SharedClock = Arc::new(clock.clone());

    let drafts = DraftService::new(
        SqliteDraftRepository::new(pool.clone()),
        SqliteAuditRepository::new(pool.clone()),
        DraftsConfig::default(),
        shared.clone(),
    );
    let catalog = SqliteBookCatalog::new(pool.clone());
    let sync = BookSyncEngine::new(
        SqliteDraftRepository::new(pool.clone()),
        SqliteAuditRepository::new(pool.clone()),
        catalog.clone(),
        SqliteCheckpointStore::new(pool.clone()),
        SyncConfig::default(),
        shared,
    );

    Harness {
        audit: SqliteAuditRepository::new(pool.clone()),
        pool,
        clock,
        drafts,
        sync,
        catalog,
        _dir: dir,
    }
}

fn request(owner: &str, book_data: Option<&str>) -> CreateDraftRequest {
    CreateDraftRequest {
        owner_id: owner.to_string(),
        content: "<p>Halfway through and already hooked.</p>".to_string(),
        book_data: book_data.map(str::to_string),
        ..Default::default()
    }
}

fn book(title: &str, author: &str) -> NewBook {
    NewBook {
        title: title.to_string(),
        authors: vec![author.to_string()],
        isbn13: None,
        publisher: None,
        thumbnail: None,
    }
}

#[tokio::test]
async fn batch_sync_links_draft_to_matching_book() {
    let h = harness().await;
    let draft = h
        .drafts
        .create_draft(request("user-1", Some(r#"{"title":"Foo","author":"Bar"}"#)))
        .await
        .unwrap();
    assert!(draft.book_id.is_none());
    let book = h.catalog.create(&book("Foo", "Bar")).await.unwrap();

    let report = h
        .sync
        .batch_sync_drafts(BatchSyncOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.synced, 1);

    let linked = h.drafts.get_draft(&draft.id, "user-1", false).await.unwrap();
    assert_eq!(linked.book_id, Some(book.id));
    assert_eq!(linked.version, draft.version + 1);

    let history = h.audit.list_for_draft(&draft.id, None).await.unwrap();
    let synced: Vec<_> = history
        .iter()
        .filter(|e| e.action == AuditAction::BookSynced)
        .collect();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].before().unwrap().book_id, None);
    assert_eq!(synced[0].after().unwrap().book_id, Some(book.id));

    let checkpoint = SqliteCheckpointStore::new(h.pool.clone());
    assert_eq!(checkpoint.load(BATCH_SYNC_JOB).await.unwrap(), None);
}

#[tokio::test]
async fn batch_sync_counts_only_resolvable_candidates() {
    let h = harness().await;
    h.catalog.create(&book("Foo", "Bar")).await.unwrap();
    h.catalog.create(&book("Twice", "Same")).await.unwrap();
    h.catalog.create(&book("twice", "same")).await.unwrap();

    for owner in ["user-1", "user-2", "user-3"] {
        h.drafts
            .create_draft(request(owner, Some(r#"{"title":"Foo","author":"Bar"}"#)))
            .await
            .unwrap();
    }
    h.drafts
        .create_draft(request("user-1", Some(r#"{"title":"Unknown","author":"Nobody"}"#)))
        .await
        .unwrap();
    h.drafts
        .create_draft(request("user-1", Some(r#"{"title":"Twice","author":"Same"}"#)))
        .await
        .unwrap();

    let report = h
        .sync
        .batch_sync_drafts(
            BatchSyncOptions {
                batch_size: Some(2),
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.processed, 5);
    assert_eq!(report.synced, 3);
    assert_eq!(report.no_match, 1);
    assert_eq!(report.ambiguous, 1);
    assert_eq!(
        h.audit
            .count_by_action_since(AuditAction::BookSynced, h.clock.now() - Duration::hours(1))
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn stale_version_leaves_row_unchanged() {
    let h = harness().await;
    let draft = h.drafts.create_draft(request("user-1", None)).await.unwrap();
    let patch = DraftPatch {
        content: Some("<p>A second, longer pass at the review.</p>".to_string()),
        ..Default::default()
    };

    let updated = h
        .drafts
        .update_draft(&draft.id, "user-1", 1, patch.clone())
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    let err = h
        .drafts
        .update_draft(&draft.id, "user-1", 1, patch)
        .await
        .unwrap_err();
    match err {
        DraftError::VersionConflict { current, .. } => assert_eq!(current.version, 2),
        other => panic!("expected version conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn overdue_draft_expires_on_read_and_restores() {
    let h = harness().await;
    let draft = h.drafts.create_draft(request("user-1", None)).await.unwrap();

    h.clock.advance(Duration::days(7) + Duration::seconds(1));
    let expired = h.drafts.get_draft(&draft.id, "user-1", false).await.unwrap();
    assert_eq!(expired.status, DraftStatus::Expired);
    let again = h.drafts.get_draft(&draft.id, "user-1", false).await.unwrap();
    assert_eq!(again.version, expired.version);

    let restored = h.drafts.restore_draft(&draft.id, "user-1").await.unwrap();
    assert_eq!(restored.status, DraftStatus::Active);
    assert!(restored.expires_at > h.clock.now());
}

#[tokio::test]
async fn save_after_expiry_is_stale_and_can_restore() {
    let h = harness().await;
    let draft = h.drafts.create_draft(request("user-1", None)).await.unwrap();
    h.clock.advance(Duration::days(8));

    let patch = DraftPatch {
        content: Some("<p>Autosave from a tab left open all week.</p>".to_string()),
        ..Default::default()
    };
    let err = h
        .drafts
        .update_draft(&draft.id, "user-1", 1, patch.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DraftError::StaleDraft {
            status: DraftStatus::Expired
        }
    ));

    let restored = h
        .drafts
        .update_draft(
            &draft.id,
            "user-1",
            1,
            DraftPatch {
                restore: true,
                ..patch
            },
        )
        .await
        .unwrap();
    assert_eq!(restored.status, DraftStatus::Active);
    assert_eq!(restored.version, 2);
    assert_eq!(h.drafts.get_draft(&draft.id, "user-1", false).await.unwrap(), restored);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_at_one_version_have_one_winner() {
    let h = harness().await;
    let draft = h.drafts.create_draft(request("user-1", None)).await.unwrap();
    let drafts = Arc::new(h.drafts);

    let mut writers = tokio::task::JoinSet::new();
    for i in 0..8 {
        let drafts = drafts.clone();
        let id = draft.id;
        writers.spawn(async move {
            let patch = DraftPatch {
                content: Some(format!("<p>Writer {i} saving its own take on the book.</p>")),
                ..Default::default()
            };
            drafts.update_draft(&id, "user-1", 1, patch).await
        });
    }

    let mut wins = 0;
    while let Some(joined) = writers.join_next().await {
        match joined.unwrap() {
            Ok(saved) => {
                assert_eq!(saved.version, 2);
                wins += 1;
            }
            Err(DraftError::VersionConflict { current, .. }) => assert_eq!(current.version, 2),
            Err(other) => panic!("expected a win or a version conflict, got {other:?}"),
        }
    }
    assert_eq!(wins, 1);

    let stored = drafts.get_draft(&draft.id, "user-1", false).await.unwrap();
    assert_eq!(stored.version, 2);
    let updates = h
        .audit
        .list_for_draft(&draft.id, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.action == AuditAction::Updated)
        .count();
    assert_eq!(updates, 1);
}

#[tokio::test]
async fn migrate_upgrades_legacy_rows_then_validates_clean() {
    let h = harness().await;
    let now = h.clock.now();
    sqlx::query("INSERT INTO users (id) VALUES ('user-1')")
        .execute(&h.pool.writer)
        .await
        .unwrap();
    for _ in 0..3 {
        let id = readzone_types::draft::DraftId::new();
        sqlx::query(
            "INSERT INTO review_drafts (id, owner_id, content, created_at, updated_at)
             VALUES (?, 'user-1', 'an older draft body', ?, ?)",
        )
        .bind(id.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&h.pool.writer)
        .await
        .unwrap();
    }

    let maintenance = DraftMaintenance::new(
        SqliteMaintenanceRepository::new(h.pool.clone()),
        SqliteDraftRepository::new(h.pool.clone()),
        SqliteAuditRepository::new(h.pool.clone()),
        MaintenanceConfig {
            batch_size: 2,
            ..Default::default()
        },
        DraftsConfig::default(),
        Arc::new(h.clock.clone()),
    );

    assert!(!maintenance.validate().await.unwrap().is_fit);
    let stats = maintenance
        .migrate(false, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.migrated, 3);

    let status = maintenance.status().await.unwrap();
    assert!(status.complete);
    assert_eq!(status.progress_percent, 100);
    assert!(maintenance.validate().await.unwrap().is_fit);

    let listed = h.drafts.list_drafts("user-1", Some(1), Some(5), None).await.unwrap();
    assert_eq!(listed.total, 3);
    assert!(listed.items.iter().all(|d| d.version == 1));
}
