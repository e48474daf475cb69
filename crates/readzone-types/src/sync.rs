//! Book synchronization outcomes, policies and batch reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::book::BookId;
use crate::draft::{DraftId, DraftStatus, ItemFailure};

/// How sure the caller is that the draft's book data describes a real book.
///
/// Batch sync always runs `Unconfirmed`; only an interactive save can vouch
/// for its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncConfidence {
    #[default]
    Unconfirmed,
    Confirmed,
}

/// When sync may create a new canonical book instead of leaving the draft unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoCreatePolicy {
    /// Never create books; unmatched drafts wait for the catalog.
    Never,
    /// Create when the caller passes `SyncConfidence::Confirmed`.
    #[default]
    CallerConfirmed,
    /// Create only when confirmed and the book data carries a valid ISBN-13.
    CallerConfirmedWithIsbn,
}

impl AutoCreatePolicy {
    pub fn allows(&self, confidence: SyncConfidence, has_isbn13: bool) -> bool {
        match (self, confidence) {
            (_, SyncConfidence::Unconfirmed) => false,
            (AutoCreatePolicy::Never, _) => false,
            (AutoCreatePolicy::CallerConfirmed, SyncConfidence::Confirmed) => true,
            (AutoCreatePolicy::CallerConfirmedWithIsbn, SyncConfidence::Confirmed) => has_isbn13,
        }
    }
}

impl fmt::Display for AutoCreatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoCreatePolicy::Never => write!(f, "never"),
            AutoCreatePolicy::CallerConfirmed => write!(f, "caller_confirmed"),
            AutoCreatePolicy::CallerConfirmedWithIsbn => write!(f, "caller_confirmed_with_isbn"),
        }
    }
}

impl FromStr for AutoCreatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "never" => Ok(AutoCreatePolicy::Never),
            "caller_confirmed" => Ok(AutoCreatePolicy::CallerConfirmed),
            "caller_confirmed_with_isbn" => Ok(AutoCreatePolicy::CallerConfirmedWithIsbn),
            other => Err(format!("invalid auto-create policy: '{other}'")),
        }
    }
}

/// Result of one matching attempt against the catalog.
///
/// Only `Linked` and `Created` change the draft. Everything else leaves it
/// unlinked for a later batch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Exactly one catalog book matched and the draft now references it.
    Linked { book_id: BookId },
    /// No match; a new canonical book was created and linked.
    Created { book_id: BookId },
    /// The draft already references a canonical book.
    AlreadyLinked { book_id: BookId },
    /// Nothing to match on.
    NoBookData,
    NoMatch,
    /// Several catalog books matched; the engine does not pick one.
    Ambiguous { candidates: usize },
    /// The catalog lookup exceeded its time budget.
    TimedOut,
    InvalidBookData { reason: String },
    /// Another writer bumped the version between load and link.
    Conflict,
    /// Only Active drafts are synced.
    NotEligible { status: DraftStatus },
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Linked { .. } | SyncOutcome::Created { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Linked { .. } => "linked",
            SyncOutcome::Created { .. } => "created",
            SyncOutcome::AlreadyLinked { .. } => "already_linked",
            SyncOutcome::NoBookData => "no_book_data",
            SyncOutcome::NoMatch => "no_match",
            SyncOutcome::Ambiguous { .. } => "ambiguous",
            SyncOutcome::TimedOut => "timed_out",
            SyncOutcome::InvalidBookData { .. } => "invalid_book_data",
            SyncOutcome::Conflict => "conflict",
            SyncOutcome::NotEligible { .. } => "not_eligible",
        }
    }
}

/// Result of syncing a single draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub draft_id: DraftId,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
    /// Draft version after the attempt.
    pub version: i64,
}

impl SyncResult {
    /// The canonical book the draft references after this attempt, if any.
    pub fn book_id(&self) -> Option<BookId> {
        match &self.outcome {
            SyncOutcome::Linked { book_id }
            | SyncOutcome::Created { book_id }
            | SyncOutcome::AlreadyLinked { book_id } => Some(*book_id),
            _ => None,
        }
    }
}

/// Summary of a batch sync run.
///
/// Per-draft failures land in `errors`; the run itself still succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSyncReport {
    pub processed: usize,
    pub synced: usize,
    pub no_match: usize,
    pub ambiguous: usize,
    pub timed_out: usize,
    pub conflicts: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<ItemFailure>,
    /// Drafts linked in this run.
    pub synced_ids: Vec<DraftId>,
    /// Stopped early by cancellation; the checkpoint holds the resume point.
    pub interrupted: bool,
    /// Cursor the run started after, when resuming a checkpoint.
    pub resumed_from: Option<DraftId>,
    pub duration_ms: u64,
}

impl BatchSyncReport {
    /// Fold one item's result into the running totals.
    pub fn record(&mut self, draft_id: DraftId, result: Result<SyncResult, String>) {
        self.processed += 1;
        match result {
            Ok(result) => match result.outcome {
                SyncOutcome::Linked { .. } | SyncOutcome::Created { .. } => {
                    self.synced += 1;
                    self.synced_ids.push(draft_id);
                }
                SyncOutcome::NoMatch => self.no_match += 1,
                SyncOutcome::Ambiguous { .. } => self.ambiguous += 1,
                SyncOutcome::TimedOut => self.timed_out += 1,
                SyncOutcome::Conflict => self.conflicts += 1,
                SyncOutcome::InvalidBookData { reason } => {
                    self.failed += 1;
                    self.errors.push(ItemFailure::new(draft_id, reason));
                }
                SyncOutcome::AlreadyLinked { .. }
                | SyncOutcome::NoBookData
                | SyncOutcome::NotEligible { .. } => self.skipped += 1,
            },
            Err(error) => {
                self.failed += 1;
                self.errors.push(ItemFailure::new(draft_id, error));
            }
        }
    }
}

/// Sync activity observed through the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetrics {
    pub window_hours: i64,
    pub synced_in_window: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub pending_candidates: u64,
}
