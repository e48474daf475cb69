use thiserror::Error;

use crate::draft::{Draft, DraftStatus};

/// Errors from repository operations (used by trait definitions in readzone-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),
}

/// A content or shape rule a draft mutation violated. Checked before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("content is {actual} bytes, exceeding the {max}-byte limit")]
    ContentTooLarge { actual: usize, max: usize },

    #[error("content has {actual} characters of text, at least {min} required")]
    ContentTooShort { actual: usize, min: usize },

    #[error("title is {actual} characters, exceeding the {max}-character limit")]
    TitleTooLong { actual: usize, max: usize },

    #[error("book data is not valid: {0}")]
    InvalidBookData(String),

    #[error("owner id must not be empty")]
    MissingOwner,

    #[error("page must be at least 1")]
    InvalidPage,

    #[error("limit must be between 1 and {max}")]
    InvalidLimit { max: u32 },

    #[error("update carries no changes")]
    EmptyPatch,
}

impl ValidationError {
    /// Stable machine-readable rule identifier.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::ContentTooLarge { .. } => "content_too_large",
            ValidationError::ContentTooShort { .. } => "content_too_short",
            ValidationError::TitleTooLong { .. } => "title_too_long",
            ValidationError::InvalidBookData(_) => "invalid_book_data",
            ValidationError::MissingOwner => "missing_owner",
            ValidationError::InvalidPage => "invalid_page",
            ValidationError::InvalidLimit { .. } => "invalid_limit",
            ValidationError::EmptyPatch => "empty_patch",
        }
    }
}

/// Errors returned to the immediate caller of a single-draft operation.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft not found")]
    NotFound,

    /// The caller's expected version is stale. Carries the authoritative draft.
    #[error("version conflict: expected {expected}, current is {}", .current.version)]
    VersionConflict { expected: i64, current: Box<Draft> },

    #[error("draft is {status}; restore it before editing")]
    StaleDraft { status: DraftStatus },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("an active draft already exists for this book")]
    DuplicateDraft,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for DraftError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => DraftError::NotFound,
            other => DraftError::Storage(other.to_string()),
        }
    }
}

/// Systemic failures that abort a sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("draft not found")]
    DraftNotFound,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("catalog error: {0}")]
    Catalog(String),
}

impl From<RepositoryError> for SyncError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => SyncError::DraftNotFound,
            other => SyncError::Storage(other.to_string()),
        }
    }
}

/// Failures delivering or preparing expiration notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery timed out after {0} ms")]
    Timeout(u64),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for NotificationError {
    fn from(err: RepositoryError) -> Self {
        NotificationError::Storage(err.to_string())
    }
}

/// Failures from operator migration and cleanup tooling.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    /// Validation found orphaned or corrupt rows. Never auto-repaired.
    #[error("integrity check failed with {} issue(s)", .issues.len())]
    IntegrityError { issues: Vec<String> },

    #[error("destructive operation requires the confirmation string '{expected}'")]
    ConfirmationRequired { expected: &'static str },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for MaintenanceError {
    fn from(err: RepositoryError) -> Self {
        MaintenanceError::Storage(err.to_string())
    }
}
