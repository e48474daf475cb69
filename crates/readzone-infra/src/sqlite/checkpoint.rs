//! SQLite job checkpoint store. One resume cursor per job name.

use readzone_core::repository::checkpoint::CheckpointStore;
use readzone_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, query_error};

#[derive(Clone)]
pub struct SqliteCheckpointStore {
    pool: DatabasePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, job: &str) -> Result<Option<String>, RepositoryError> {
        sqlx::query_scalar("SELECT cursor FROM job_checkpoints WHERE job = ?")
            .bind(job)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)
    }

    async fn save(&self, job: &str, cursor: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO job_checkpoints (job, cursor, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(job) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at",
        )
        .bind(job)
        .bind(cursor)
        .bind(format_datetime(&chrono::Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn clear(&self, job: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM job_checkpoints WHERE job = ?")
            .bind(job)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::database_url;

    #[tokio::test]
    async fn test_save_overwrites_and_clear_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointStore::new(DatabasePool::new(&database_url(dir.path())).await.unwrap());

        assert_eq!(store.load("book_sync").await.unwrap(), None);
        store.save("book_sync", "a").await.unwrap();
        store.save("book_sync", "b").await.unwrap();
        assert_eq!(store.load("book_sync").await.unwrap().as_deref(), Some("b"));

        store.clear("book_sync").await.unwrap();
        assert_eq!(store.load("book_sync").await.unwrap(), None);
    }
}
