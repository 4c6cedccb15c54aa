//! Chunk domain module.
//!
//! - `model`: the `Chunk` record, its status and outcome types
//! - `splitter`: pure text splitting and chunk naming
//! - `registry`: the ordered chunk collection of one generation

mod model;
mod registry;
pub mod splitter;

pub use model::{
    Chunk, ChunkCounts, ChunkOutcome, ChunkStatus, EMPTY_RESULT_MESSAGE, INTERRUPTED_MESSAGE,
};
pub use registry::ChunkRegistry;
