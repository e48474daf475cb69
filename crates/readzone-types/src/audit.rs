//! Append-only audit trail for draft mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::book::BookId;
use crate::draft::{Draft, DraftId, DraftStatus};

/// Actor id recorded for system-level writers (sync engine, cleanup, migration).
pub const SYSTEM_ACTOR: &str = "system";

/// Actions tracked in the draft audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    BookSynced,
    Expired,
    Deleted,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Created => write!(f, "created"),
            AuditAction::Updated => write!(f, "updated"),
            AuditAction::BookSynced => write!(f, "book_synced"),
            AuditAction::Expired => write!(f, "expired"),
            AuditAction::Deleted => write!(f, "deleted"),
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(AuditAction::Created),
            "updated" => Ok(AuditAction::Updated),
            "book_synced" => Ok(AuditAction::BookSynced),
            "expired" => Ok(AuditAction::Expired),
            "deleted" => Ok(AuditAction::Deleted),
            other => Err(format!("invalid audit action: '{other}'")),
        }
    }
}

/// Immutable record of one state-changing action on a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub draft_id: DraftId,
    /// The owner for user actions, [`SYSTEM_ACTOR`] or an operator id otherwise.
    pub actor_id: String,
    pub action: AuditAction,
    /// Serialized [`DraftSnapshot`] before the change.
    pub before_snapshot: Option<String>,
    /// Serialized [`DraftSnapshot`] after the change.
    pub after_snapshot: Option<String>,
    /// Optional JSON context (cleanup reason, conflict details).
    pub details: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry for a transition from `before` to `after`.
    pub fn record(
        draft_id: DraftId,
        actor_id: impl Into<String>,
        action: AuditAction,
        before: Option<&Draft>,
        after: Option<&Draft>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            draft_id,
            actor_id: actor_id.into(),
            action,
            before_snapshot: before.map(|d| DraftSnapshot::from(d).to_json()),
            after_snapshot: after.map(|d| DraftSnapshot::from(d).to_json()),
            details: None,
            occurred_at,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details.to_string());
        self
    }

    /// Decode the before-snapshot, if present and well-formed.
    pub fn before(&self) -> Option<DraftSnapshot> {
        self.before_snapshot
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }

    /// Decode the after-snapshot, if present and well-formed.
    pub fn after(&self) -> Option<DraftSnapshot> {
        self.after_snapshot
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
    }
}

/// The subset of a draft captured in audit snapshots.
///
/// Content is recorded by length only; the full text lives in the draft row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub status: DraftStatus,
    pub version: i64,
    pub book_id: Option<BookId>,
    pub title: Option<String>,
    pub content_length: usize,
    pub expires_at: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn to_json(&self) -> String {
        // Plain data with no maps keyed by non-strings; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&Draft> for DraftSnapshot {
    fn from(draft: &Draft) -> Self {
        Self {
            status: draft.status,
            version: draft.version,
            book_id: draft.book_id,
            title: draft.title.clone(),
            content_length: draft.content.chars().count(),
            expires_at: draft.expires_at,
        }
    }
}
