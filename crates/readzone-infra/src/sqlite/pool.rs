//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. This module provides a `DatabasePool`
//! with a multi-connection reader pool for concurrent reads and a single-connection
//! writer pool for serialized writes. Both use WAL journal mode and enforce foreign keys.

use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use readzone_core::monitor::{PoolHealth, PoolMonitor, PoolStats};
use readzone_types::config::PoolConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (`pool.max_connections`) for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
    monitor: PoolMonitor,
    reader_max: u32,
}

impl DatabasePool {
    /// Open with default pool settings.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::with_config(database_url, &PoolConfig::default()).await
    }

    /// Create a new DatabasePool with split reader/writer connections.
    ///
    /// Runs migrations automatically on the writer pool.
    /// Both pools use WAL journal mode, foreign key enforcement, and 5-second busy timeout.
    pub async fn with_config(database_url: &str, config: &PoolConfig) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await?;

        // Run migrations on writer before opening reader pool
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader_max = config.max_connections.max(1);
        let reader = SqlitePoolOptions::new()
            .max_connections(reader_max)
            .connect_with(read_opts)
            .await?;

        tracing::debug!(url = database_url, reader_max, "database pool opened");

        Ok(Self {
            reader,
            writer,
            monitor: PoolMonitor::new(config),
            reader_max,
        })
    }

    pub fn monitor(&self) -> &PoolMonitor {
        &self.monitor
    }

    /// Utilization of both pools. Only the reader pool is judged for stress;
    /// the writer is a single connection.
    pub fn health(&self) -> Vec<PoolHealth> {
        let reader = PoolStats {
            size: self.reader.size(),
            idle: self.reader.num_idle() as u32,
            max: self.reader_max,
        };
        let writer = PoolStats {
            size: self.writer.size(),
            idle: self.writer.num_idle() as u32,
            max: 1,
        };
        vec![
            self.monitor.report("reader", reader),
            self.monitor.report_exclusive("writer", writer),
        ]
    }

    /// Run a query future, warning if it exceeds the slow-query threshold.
    pub async fn timed<T, F>(&self, label: &str, query: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let out = query.await;
        self.monitor.observe_query(label, started.elapsed());
        out
    }

    /// Close both pools, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}

/// SQLite URL for the database file inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("readzone.db").display())
}
