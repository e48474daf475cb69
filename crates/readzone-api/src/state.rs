//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository and transport traits, but AppState
//! pins them to the concrete infra implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use readzone_core::clock::{SharedClock, SystemClock};
use readzone_core::service::draft::DraftService;
use readzone_core::service::maintenance::DraftMaintenance;
use readzone_core::service::notifier::ExpirationNotifier;
use readzone_core::service::sync::BookSyncEngine;
use readzone_infra::config::{load_config, resolve_data_dir};
use readzone_infra::notify::ConfiguredSender;
use readzone_infra::sqlite::audit::SqliteAuditRepository;
use readzone_infra::sqlite::book::SqliteBookCatalog;
use readzone_infra::sqlite::checkpoint::SqliteCheckpointStore;
use readzone_infra::sqlite::draft::SqliteDraftRepository;
use readzone_infra::sqlite::maintenance::SqliteMaintenanceRepository;
use readzone_infra::sqlite::pool::{DatabasePool, database_url};
use readzone_types::config::DraftConfig;
use readzone_types::draft::Draft;
use readzone_types::sync::{SyncConfidence, SyncResult};

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteDraftService = DraftService<SqliteDraftRepository, SqliteAuditRepository>;

pub type ConcreteSyncEngine = BookSyncEngine<
    SqliteDraftRepository,
    SqliteAuditRepository,
    SqliteBookCatalog,
    SqliteCheckpointStore,
>;

pub type ConcreteNotifier = ExpirationNotifier<SqliteDraftRepository, ConfiguredSender>;

pub type ConcreteMaintenance =
    DraftMaintenance<SqliteMaintenanceRepository, SqliteDraftRepository, SqliteAuditRepository>;

/// Overrides taken from global CLI flags.
#[derive(Debug, Default)]
pub struct InitOptions {
    pub data_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Database file; defaults to `{data_dir}/readzone.db`.
    pub database: Option<PathBuf>,
}

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub drafts: Arc<ConcreteDraftService>,
    pub sync: Arc<ConcreteSyncEngine>,
    pub notifier: Arc<ConcreteNotifier>,
    pub maintenance: Arc<ConcreteMaintenance>,
    pub config: Arc<DraftConfig>,
    pub sender: &'static str,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init(options: InitOptions) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir(options.data_dir.as_deref());

        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir, options.config.as_deref()).await;

        let db_url = match &options.database {
            Some(path) => sqlite_url(path),
            None => database_url(&data_dir),
        };
        let db_pool = DatabasePool::with_config(&db_url, &config.pool)
            .await
            .with_context(|| format!("failed to open database {db_url}"))?;

        let sender = ConfiguredSender::from_config(&config.notifier)
            .context("failed to configure notification sender")?;

        Ok(Self::wire(config, sender, data_dir, db_pool))
    }

    /// Build the services over an open pool.
    pub fn wire(
        config: DraftConfig,
        sender: ConfiguredSender,
        data_dir: PathBuf,
        db_pool: DatabasePool,
    ) -> Self {
        let clock: SharedClock = Arc::new(SystemClock);
        let draft_repo = SqliteDraftRepository::new(db_pool.clone());
        let audit_repo = SqliteAuditRepository::new(db_pool.clone());

        let drafts = DraftService::new(
            draft_repo.clone(),
            audit_repo.clone(),
            config.drafts.clone(),
            clock.clone(),
        );

        let sync = BookSyncEngine::new(
            draft_repo.clone(),
            audit_repo.clone(),
            SqliteBookCatalog::new(db_pool.clone()),
            SqliteCheckpointStore::new(db_pool.clone()),
            config.sync.clone(),
            clock.clone(),
        );

        let sender_name = sender.name();
        let notifier = ExpirationNotifier::new(
            draft_repo.clone(),
            sender,
            config.notifier.clone(),
            clock.clone(),
        );

        let maintenance = DraftMaintenance::new(
            SqliteMaintenanceRepository::new(db_pool.clone()),
            draft_repo,
            audit_repo,
            config.maintenance.clone(),
            config.drafts.clone(),
            clock,
        );

        tracing::debug!(data_dir = %data_dir.display(), sender = sender_name, "services wired");

        Self {
            drafts: Arc::new(drafts),
            sync: Arc::new(sync),
            notifier: Arc::new(notifier),
            maintenance: Arc::new(maintenance),
            config: Arc::new(config),
            sender: sender_name,
            data_dir,
            db_pool,
        }
    }
}

impl AppState {
    /// Inline book sync on the save path.
    ///
    /// Runs only for drafts that still need a canonical book. A sync failure
    /// never fails the save: it is logged and the batch path retries later.
    pub async fn sync_after_save(
        &self,
        draft: Draft,
        confidence: SyncConfidence,
    ) -> (Draft, Option<SyncResult>) {
        if !draft.needs_book_sync() {
            return (draft, None);
        }

        let result = match self.sync.sync_draft_book(&draft.id, confidence).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(draft_id = %draft.id, error = %e, "inline book sync failed");
                return (draft, None);
            }
        };
        if !result.outcome.is_synced() {
            return (draft, Some(result));
        }

        match self.drafts.get_draft(&draft.id, &draft.owner_id, false).await {
            Ok(linked) => (linked, Some(result)),
            Err(e) => {
                tracing::warn!(draft_id = %draft.id, error = %e, "reload after inline sync failed");
                let mut linked = draft;
                linked.book_id = result.book_id();
                linked.version = result.version;
                (linked, Some(result))
            }
        }
    }
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}
