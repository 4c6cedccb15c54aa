pub mod chunk;
pub mod config;
pub mod error;
pub mod service;
pub mod session;

// Re-export common error type
pub use error::{ChunkError, Result};
