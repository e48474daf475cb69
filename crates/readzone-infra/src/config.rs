//! Configuration loader for ReadZone.
//!
//! Reads `config.toml` from the data directory (`~/.readzone/` in production)
//! and deserializes it into [`DraftConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use readzone_types::config::DraftConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "READZONE_DATA_DIR";

/// Resolve the data directory.
///
/// Priority: explicit override, then `READZONE_DATA_DIR`, then `~/.readzone`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".readzone")
}

/// Load configuration from `path`, or `{data_dir}/config.toml` when `path` is `None`.
///
/// - If the file does not exist, returns [`DraftConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_config(data_dir: &Path, path: Option<&Path>) -> DraftConfig {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join("config.toml"));

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return DraftConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return DraftConfig::default();
        }
    };

    match toml::from_str::<DraftConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            DraftConfig::default()
        }
    }
}
