//! Bounded-concurrency chunk dispatch.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, RunSummary};
