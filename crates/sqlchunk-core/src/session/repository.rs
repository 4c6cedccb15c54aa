//! Session store trait.
//!
//! Defines the interface for snapshot persistence.

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;

/// Well-known key under which the single session snapshot is stored.
pub const SNAPSHOT_KEY: &str = "sql_chunk_converter_state";

/// An abstract store holding the one persisted session snapshot.
///
/// This decouples the coordinator from the concrete storage mechanism
/// (a TOML file, a browser-like key/value store, an in-memory map in tests).
///
/// # Implementation Notes
///
/// Implementations should:
/// - Treat an absent, unreadable, or version-mismatched record as `Ok(None)`
/// - Replace the previous snapshot atomically on `save`
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the persisted snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: A snapshot with a recognized version was found
    /// - `Ok(None)`: Nothing usable is stored
    /// - `Err(_)`: The storage itself could not be accessed
    async fn load(&self) -> Result<Option<Session>>;

    /// Replaces the persisted snapshot with `session`.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Removes the persisted snapshot (no-op when absent).
    async fn clear(&self) -> Result<()>;
}
