//! Path management for sqlchunk files.
//!
//! ```text
//! ~/.config/sqlchunk/
//! ├── config.toml      # Application configuration
//! └── session.toml     # Persisted session snapshot
//! ```

use sqlchunk_core::error::{ChunkError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "sqlchunk";
const CONFIG_FILE: &str = "config.toml";
const SNAPSHOT_FILE: &str = "session.toml";

pub struct SqlchunkPaths;

impl SqlchunkPaths {
    /// Returns the sqlchunk configuration directory (e.g. `~/.config/sqlchunk/`).
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| ChunkError::config("cannot determine the config directory"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Default location of the session snapshot.
    pub fn snapshot_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(SNAPSHOT_FILE))
    }
}
