//! Application layer for sqlchunk.
//!
//! `SessionCoordinator` owns the session value and exposes one explicit
//! command method per user action, delegating chunk runs to the dispatcher.

pub mod session_coordinator;

pub use session_coordinator::{PromptGeneration, SessionCoordinator};
pub use sqlchunk_execution::RunSummary;
