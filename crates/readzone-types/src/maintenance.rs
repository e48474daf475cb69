//! Reports produced by the operator migration, validation and cleanup tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::book::BookId;
use crate::draft::{DraftId, DraftStatus, ItemFailure};

/// Raw view of a draft row as stored, before any shape assumptions.
///
/// Legacy rows predate the lifecycle columns, so those are optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: DraftId,
    pub owner_id: String,
    pub book_id: Option<BookId>,
    pub status: Option<String>,
    pub version: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub owner_exists: bool,
    /// False only when `book_id` is set and points at no book.
    pub book_exists: bool,
}

impl DraftRecord {
    /// All lifecycle columns are populated.
    pub fn is_current_shape(&self) -> bool {
        self.status.is_some()
            && self.version.is_some()
            && self.expires_at.is_some()
            && self.last_accessed_at.is_some()
    }

    pub fn is_orphaned(&self) -> bool {
        !self.owner_exists
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Integrity problems with this row, one line each.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let id = self.id;

        if self.expires_at.is_none() {
            issues.push(format!("draft {id}: missing expires_at"));
        }
        if self.last_accessed_at.is_none() {
            issues.push(format!("draft {id}: missing last_accessed_at"));
        }
        match self.status.as_deref() {
            None => issues.push(format!("draft {id}: missing status")),
            Some(raw) if raw.parse::<DraftStatus>().is_err() => {
                issues.push(format!("draft {id}: invalid status '{raw}'"));
            }
            Some(_) => {}
        }
        if self.version.is_none_or(|v| v < 1) {
            issues.push(format!("draft {id}: invalid version"));
        }
        if !self.owner_exists {
            issues.push(format!("draft {id}: orphaned, owner '{}' not found", self.owner_id));
        }
        if !self.book_exists {
            issues.push(format!("draft {id}: book reference points at no book"));
        }

        issues
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total: u64,
    pub valid: u64,
    pub expired: u64,
    pub orphaned: u64,
}

/// Read-only integrity scan result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// No issues were found.
    pub is_fit: bool,
    pub issues: Vec<String>,
    pub stats: ValidationStats,
    pub duration_ms: u64,
}

/// Outcome of upgrading legacy rows to the current shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub dry_run: bool,
    /// Rows scanned.
    pub total: u64,
    pub migrated: u64,
    /// Rows already in the current shape.
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<ItemFailure>,
    /// Stopped early by cancellation; a rerun picks up the remaining legacy rows.
    pub interrupted: bool,
    pub duration_ms: u64,
}

/// Outcome of returning rows to the legacy shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackStats {
    pub reverted: u64,
    pub batches: u64,
    pub duration_ms: u64,
}

/// Outcome of a cleanup run. In dry-run mode the counts are what would change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    /// Overdue Active drafts flipped to Expired.
    pub expired: u64,
    /// Oldest Active drafts abandoned to bring users under the per-user cap.
    pub abandoned_excess: u64,
    /// Expired/Abandoned rows past the retention window, removed.
    pub deleted_retired: u64,
    /// Drafts whose owner no longer exists, removed.
    pub deleted_orphaned: u64,
    pub audit_pruned: u64,
    /// The store's index optimizer ran.
    pub optimized: bool,
    pub errors: Vec<ItemFailure>,
    pub duration_ms: u64,
}

/// How far the store is through the shape upgrade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub complete: bool,
    /// Whole percent of rows in the current shape; 100 for an empty store.
    pub progress_percent: u8,
    pub total: u64,
    pub current_shape: u64,
    pub legacy: u64,
    pub expired: u64,
    pub audit_records: u64,
    pub needs_cleanup: bool,
}

impl MigrationStatus {
    pub fn progress(current_shape: u64, total: u64) -> u8 {
        if total == 0 {
            return 100;
        }
        ((current_shape as f64 / total as f64) * 100.0).round() as u8
    }
}
