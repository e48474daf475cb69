//! Configuration types for the draft subsystem.
//!
//! `DraftConfig` represents `config.toml` in the data directory. Every
//! section and field is optional; omitted values take the defaults below.

use serde::{Deserialize, Serialize};

use crate::draft::{DRAFT_TTL_DAYS, MAX_CONTENT_BYTES, MAX_TITLE_CHARS, MIN_TEXT_CHARS};
use crate::sync::AutoCreatePolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftConfig {
    #[serde(default)]
    pub drafts: DraftsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Draft lifetime and content rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftsConfig {
    pub ttl_days: i64,
    pub max_content_bytes: usize,
    pub min_text_chars: usize,
    pub max_title_chars: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            ttl_days: DRAFT_TTL_DAYS,
            max_content_bytes: MAX_CONTENT_BYTES,
            min_text_chars: MIN_TEXT_CHARS,
            max_title_chars: MAX_TITLE_CHARS,
            default_page_size: 5,
            max_page_size: 50,
        }
    }
}

/// Book synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drafts per sub-batch.
    pub batch_size: usize,
    /// Hard ceiling on `batch_size`, including caller overrides.
    pub max_batch_size: usize,
    /// Candidates fetched per batch run.
    pub candidate_limit: usize,
    /// Time budget for one catalog lookup.
    pub lookup_timeout_ms: u64,
    pub auto_create: AutoCreatePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_batch_size: 20,
            candidate_limit: 100,
            lookup_timeout_ms: 2_000,
            auto_create: AutoCreatePolicy::CallerConfirmed,
        }
    }
}

impl SyncConfig {
    /// Clamp a requested sub-batch size into `1..=max_batch_size`.
    pub fn effective_batch_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.batch_size)
            .clamp(1, self.max_batch_size.max(1))
    }
}

/// Expiration notifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub early_warning_hours: i64,
    pub final_warning_hours: i64,
    /// Window for the per-user "expiring soon" listing.
    pub user_warning_hours: i64,
    pub delivery_timeout_ms: u64,
    pub max_targets: usize,
    /// When set, messages are POSTed here instead of only being logged.
    pub webhook_url: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            early_warning_hours: 48,
            final_warning_hours: 24,
            user_warning_hours: 72,
            delivery_timeout_ms: 5_000,
            max_targets: 500,
            webhook_url: None,
        }
    }
}

/// Migration and cleanup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub batch_size: usize,
    /// Days an Expired/Abandoned draft is kept before physical removal.
    pub retention_days: i64,
    pub max_drafts_per_user: usize,
    /// Prune audit entries older than this many days. Disabled when unset.
    pub audit_retention_days: Option<i64>,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            retention_days: 7,
            max_drafts_per_user: 5,
            audit_retention_days: None,
        }
    }
}

/// Connection pool sizing and instrumentation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Utilization ratio above which the pool counts as under stress.
    pub stress_threshold: f64,
    pub slow_query_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            stress_threshold: 0.8,
            slow_query_ms: 500,
        }
    }
}

/// REST server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bearer token for operator routes. Operator routes are disabled when unset.
    pub admin_token: Option<String>,
}
