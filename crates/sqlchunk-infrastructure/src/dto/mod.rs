//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs are the on-disk schema of the session snapshot. They stay
//! private to the infrastructure layer so the domain model can change
//! without breaking stored snapshots.
//!
//! ## Snapshot Version History
//! - **1**: Initial schema (parameters, documents, prompts, chunks)

mod session;

pub use session::{ChunkV1, ParametersV1, SNAPSHOT_VERSION, SessionSnapshotV1, SnapshotProbe};
