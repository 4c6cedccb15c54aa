pub mod report;
pub mod run;
pub mod session;

use anyhow::{Context, Result};
use sqlchunk_application::SessionCoordinator;
use sqlchunk_core::config::AppConfig;
use sqlchunk_infrastructure::TomlSessionStore;
use sqlchunk_interaction::HttpConversionService;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Restores the persisted session against the configured service and store.
pub async fn open(config: &AppConfig) -> Result<SessionCoordinator> {
    let store = TomlSessionStore::default_location(config.storage.snapshot_path.clone())
        .context("Failed to resolve the snapshot location")?;
    tracing::debug!(path = %store.path().display(), "Using session snapshot");
    let service = HttpConversionService::from_config(&config.service);

    SessionCoordinator::restore(Arc::new(store), Arc::new(service), &config.defaults)
        .await
        .context("Failed to restore the session")
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// File name component of `path`, for display and export naming.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
