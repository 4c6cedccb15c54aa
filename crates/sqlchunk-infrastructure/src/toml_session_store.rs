//! TOML-based SessionStore implementation

use crate::dto::{SessionSnapshotV1, SnapshotProbe};
use crate::paths::SqlchunkPaths;
use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use sqlchunk_core::error::{ChunkError, Result};
use sqlchunk_core::session::{Session, SessionStore};
use std::path::{Path, PathBuf};

/// Stores the single session snapshot in one TOML file.
///
/// - Writes go through [`AtomicTomlFile`] (lock, temp file, fsync, rename)
/// - Only snapshots tagged with the current version are read back
/// - A corrupt or foreign file is logged and treated as absent
pub struct TomlSessionStore {
    file: AtomicTomlFile<SessionSnapshotV1>,
}

impl TomlSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            file: AtomicTomlFile::new(path.as_ref().to_path_buf()),
        }
    }

    /// Store at `override_path`, or at the default snapshot location.
    pub fn default_location(override_path: Option<PathBuf>) -> Result<Self> {
        let path = match override_path {
            Some(path) => path,
            None => SqlchunkPaths::snapshot_file()?,
        };
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    fn read(&self) -> Result<Option<Session>> {
        let Some(content) = self.file.load_raw()? else {
            return Ok(None);
        };

        let probe: SnapshotProbe = match toml::from_str(&content) {
            Ok(probe) => probe,
            Err(e) => {
                tracing::warn!(path = %self.path().display(), error = %e, "Ignoring unreadable session snapshot");
                return Ok(None);
            }
        };
        if !probe.is_supported() {
            tracing::warn!(
                path = %self.path().display(),
                version = ?probe.version,
                "Ignoring session snapshot with unsupported version"
            );
            return Ok(None);
        }

        match toml::from_str::<SessionSnapshotV1>(&content) {
            Ok(dto) => {
                tracing::debug!(saved_at = ?dto.saved_at, "Session snapshot parsed");
                Ok(Some(dto.into()))
            }
            Err(e) => {
                tracing::warn!(path = %self.path().display(), error = %e, "Ignoring malformed session snapshot");
                Ok(None)
            }
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChunkError::internal(format!("storage task failed: {e}")))?
}

#[async_trait]
impl SessionStore for TomlSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        let store = Self {
            file: self.file.clone(),
        };
        let session = blocking(move || store.read()).await?;
        if let Some(session) = &session {
            tracing::debug!(session_id = %session.id, chunks = session.chunks().len(), "Session snapshot loaded");
        }
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let dto = SessionSnapshotV1::from(session);
        let file = self.file.clone();
        blocking(move || file.save(&dto)).await?;
        tracing::debug!(session_id = %session.id, "Session snapshot saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let file = self.file.clone();
        blocking(move || file.remove()).await?;
        tracing::debug!(path = %self.path().display(), "Session snapshot cleared");
        Ok(())
    }
}
