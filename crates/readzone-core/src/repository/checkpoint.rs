//! Durable cursors for resumable batch jobs.

use readzone_types::error::RepositoryError;

/// Stores the last processed position of a named job.
///
/// A job saves its cursor after each completed sub-batch so that a restart
/// resumes after it instead of reprocessing from the beginning.
pub trait CheckpointStore: Send + Sync {
    fn load(
        &self,
        job: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    fn save(
        &self,
        job: &str,
        cursor: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn clear(
        &self,
        job: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
