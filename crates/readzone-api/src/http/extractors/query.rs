//! Query parameter and body types for draft and operator endpoints.

use serde::Deserialize;

/// Query parameters for the draft list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct DraftListQuery {
    /// Page number, starting at 1.
    pub page: Option<u32>,
    /// Drafts per page.
    pub limit: Option<u32>,
    /// Filter by status (active, expired, abandoned, migrated).
    pub status: Option<String>,
}

/// Query parameters for reading a single draft.
#[derive(Debug, Deserialize, Default)]
pub struct GetDraftQuery {
    /// The author is reopening the draft in the editor.
    #[serde(default)]
    pub resume: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Query parameters for an explicit single-draft sync.
#[derive(Debug, Deserialize, Default)]
pub struct SyncQuery {
    /// The caller vouches for the book data.
    #[serde(default)]
    pub confident: bool,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(default = "default_window_hours")]
    pub hours: i64,
}

fn default_window_hours() -> i64 {
    24
}

/// Body of `POST /admin/sync/batch`. Every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BatchSyncBody {
    pub limit: Option<usize>,
    pub batch_size: Option<usize>,
    pub fresh: bool,
}
