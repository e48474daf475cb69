use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::book::BookId;

/// Default lifetime of a draft before it expires without renewal.
pub const DRAFT_TTL_DAYS: i64 = 7;

/// Maximum size of draft content in bytes (1 MiB).
pub const MAX_CONTENT_BYTES: usize = 1_048_576;

/// Minimum number of non-markup characters for content to count as "real".
pub const MIN_TEXT_CHARS: usize = 10;

/// Maximum length of a draft title in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Unique identifier for a draft, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftId(pub Uuid);

impl DraftId {
    /// Create a new DraftId using UUID v7 (time-sortable, guaranteed ordering).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DraftId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Draft lifecycle states.
///
/// - Active: accepts content mutations and TTL renewal
/// - Expired: `expires_at` passed without renewal; restorable
/// - Abandoned: removed by an operator or cleanup job; restorable until purged
/// - Migrated: converted into a published review; logically retired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Active,
    Expired,
    Abandoned,
    Migrated,
}

impl DraftStatus {
    /// Statuses whose rows are eligible for physical removal by cleanup.
    pub const RETIRED: [DraftStatus; 2] = [DraftStatus::Expired, DraftStatus::Abandoned];

    pub fn is_active(&self) -> bool {
        matches!(self, DraftStatus::Active)
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStatus::Active => write!(f, "active"),
            DraftStatus::Expired => write!(f, "expired"),
            DraftStatus::Abandoned => write!(f, "abandoned"),
            DraftStatus::Migrated => write!(f, "migrated"),
        }
    }
}

impl FromStr for DraftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(DraftStatus::Active),
            "expired" => Ok(DraftStatus::Expired),
            "abandoned" => Ok(DraftStatus::Abandoned),
            "migrated" => Ok(DraftStatus::Migrated),
            other => Err(format!("invalid draft status: '{other}'")),
        }
    }
}

impl Default for DraftStatus {
    fn default() -> Self {
        DraftStatus::Active
    }
}

/// Opaque UI-only key/value bag. Passed through unmodified.
pub type DraftMetadata = serde_json::Map<String, serde_json::Value>;

/// An in-progress, unpublished review authored by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    /// The authoring user. Drafts are never shared.
    pub owner_id: String,
    /// Canonical book reference. Authoritative once set.
    pub book_id: Option<BookId>,
    /// Serialized snapshot of the informally described book (JSON).
    ///
    /// Sync input while `book_id` is null; historical context afterwards.
    pub book_data: Option<String>,
    pub title: Option<String>,
    pub content: String,
    pub metadata: DraftMetadata,
    pub status: DraftStatus,
    /// Starts at 1, incremented by exactly 1 on every successful mutation.
    pub version: i64,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    /// Whether `expires_at` has passed as of `now`.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A draft with book data but no canonical book is a sync candidate.
    pub fn needs_book_sync(&self) -> bool {
        self.book_id.is_none()
            && self
                .book_data
                .as_deref()
                .is_some_and(|data| !data.trim().is_empty())
    }

    /// Whole hours until expiry, negative once expired.
    pub fn hours_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_hours()
    }
}

/// Compute an expiry timestamp `ttl_days` after `from`.
pub fn expiry_from(from: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
    from + Duration::days(ttl_days)
}

/// Request to create a new draft. Only `owner_id` and `content` are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    pub owner_id: String,
    pub content: String,
    pub title: Option<String>,
    pub book_data: Option<String>,
    /// Explicit canonical book, when the author picked one from the catalog.
    pub book_id: Option<BookId>,
    #[serde(default)]
    pub metadata: DraftMetadata,
}

/// Partial update applied to an existing draft. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub book_data: Option<String>,
    pub metadata: Option<DraftMetadata>,
    /// Flip an Expired/Abandoned draft back to Active as part of this update.
    #[serde(default)]
    pub restore: bool,
}

impl DraftPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.book_data.is_none()
            && self.metadata.is_none()
            && !self.restore
    }
}

/// One page of a user's drafts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPage {
    pub items: Vec<Draft>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_next: bool,
}

/// A per-draft failure collected by a batch job instead of aborting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub draft_id: DraftId,
    pub error: String,
}

impl ItemFailure {
    pub fn new(draft_id: DraftId, error: impl Into<String>) -> Self {
        Self {
            draft_id,
            error: error.into(),
        }
    }
}
