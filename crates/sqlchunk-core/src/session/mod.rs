//! Session domain module.
//!
//! # Module Structure
//!
//! - `params`: `ConversionParameters` and their validation
//! - `model`: the `Session` value, documents, phases and export
//! - `repository`: the `SessionStore` persistence trait
//! - `prompt`: default user prompt rendering

mod model;
mod params;
pub mod prompt;
mod repository;

pub use model::{DEFAULT_SOURCE_FILE_NAME, ExportFile, Session, SessionPhase, SourceDocument};
pub use params::{ConversionParameters, DEFAULT_CONCURRENCY, DEFAULT_MERGE_N};
pub use repository::{SNAPSHOT_KEY, SessionStore};
