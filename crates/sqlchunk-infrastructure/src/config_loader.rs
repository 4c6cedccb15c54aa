//! Application configuration loading.
//!
//! Reads `config.toml` from the sqlchunk config directory, falls back to
//! defaults when it is missing, then applies environment overrides.

use crate::paths::SqlchunkPaths;
use sqlchunk_core::config::AppConfig;
use sqlchunk_core::error::{ChunkError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Overrides `service.base_url`.
pub const ENV_SERVICE_URL: &str = "SQLCHUNK_SERVICE_URL";
/// Overrides `storage.snapshot_path`.
pub const ENV_SNAPSHOT_PATH: &str = "SQLCHUNK_SNAPSHOT_PATH";

/// Loads the configuration from an explicit file, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => SqlchunkPaths::config_file()?,
    };
    let config = read_config_file(&path)?;
    Ok(apply_overrides(config, |key| std::env::var(key).ok()))
}

/// Parses one config file. A missing file yields the defaults.
pub fn read_config_file(path: &Path) -> Result<AppConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(AppConfig::default());
        }
        Err(e) => return Err(e.into()),
    };

    toml::from_str(&content)
        .map_err(|e| ChunkError::config(format!("{}: {}", path.display(), e)))
}

/// Applies overrides read through `lookup`. Blank values are ignored.
pub fn apply_overrides<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_blank(ENV_SERVICE_URL) {
        config.service.base_url = url.trim().to_string();
    }
    if let Some(path) = non_blank(ENV_SNAPSHOT_PATH) {
        config.storage.snapshot_path = Some(PathBuf::from(path));
    }
    config
}
