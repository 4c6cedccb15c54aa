//! Chunk domain model.
//!
//! A chunk is one unit of source SQL tracked independently through the
//! conversion pipeline. Its status and error travel with it as plain data.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Message stored on a chunk that was found RUNNING when a session was loaded.
pub const INTERRUPTED_MESSAGE: &str =
    "Interrupted by a reload or restart while running; redo this chunk.";

/// Message stored when the collaborator answers without SQL and without an error.
pub const EMPTY_RESULT_MESSAGE: &str = "The service returned no sql or an empty sql.";

/// Lifecycle status of a chunk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    Waiting,
    Running,
    Succeeded,
    Failed,
}

/// One unit of source SQL and its conversion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<session id>:<index>`
    pub id: String,
    /// 0-based position; defines display and export order
    pub index: usize,
    /// Best-effort human label
    pub name: String,
    /// Source text, fixed at creation
    pub source: String,
    /// Converted text, empty until success
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub status: ChunkStatus,
    /// Error message, empty unless failed
    #[serde(default)]
    pub error: String,
    /// Per-chunk prompt that replaces the shared prompt when non-empty
    #[serde(default)]
    pub prompt_override: String,
}

impl Chunk {
    /// Creates a WAITING chunk with empty result fields.
    pub fn new(id: String, index: usize, name: String, source: String) -> Self {
        Self {
            id,
            index,
            name,
            source,
            destination: String::new(),
            status: ChunkStatus::Waiting,
            error: String::new(),
            prompt_override: String::new(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == ChunkStatus::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.status == ChunkStatus::Failed
    }

    /// Returns the prompt to send for this chunk.
    pub fn effective_prompt<'a>(&'a self, shared_prompt: &'a str) -> &'a str {
        let trimmed = self.prompt_override.trim();
        if trimmed.is_empty() {
            shared_prompt
        } else {
            trimmed
        }
    }

    /// WAITING -> RUNNING on claim. Clears the previous error.
    pub fn mark_running(&mut self) {
        self.status = ChunkStatus::Running;
        self.error.clear();
    }

    /// Puts the chunk back to WAITING with cleared error and destination.
    pub fn reset(&mut self) {
        self.status = ChunkStatus::Waiting;
        self.error.clear();
        self.destination.clear();
    }

    /// RUNNING -> SUCCEEDED | FAILED once its own call completed.
    pub fn apply(&mut self, outcome: ChunkOutcome) {
        match outcome {
            ChunkOutcome::Succeeded { sql } => {
                self.status = ChunkStatus::Succeeded;
                self.destination = sql;
                self.error.clear();
            }
            ChunkOutcome::Failed { error } => {
                self.status = ChunkStatus::Failed;
                self.destination.clear();
                self.error = error;
            }
        }
    }

    /// Turns a RUNNING chunk into a FAILED one carrying [`INTERRUPTED_MESSAGE`].
    ///
    /// Returns `true` when the chunk was changed.
    pub fn interrupt(&mut self) -> bool {
        if self.status != ChunkStatus::Running {
            return false;
        }
        self.status = ChunkStatus::Failed;
        self.destination.clear();
        self.error = INTERRUPTED_MESSAGE.to_string();
        true
    }
}

/// Result of one conversion call, as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Succeeded { sql: String },
    Failed { error: String },
}

impl ChunkOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Interprets a `{ sql, exception }` response.
    ///
    /// Non-empty `sql` with an empty `exception` is a success; anything else
    /// fails with the exception, or [`EMPTY_RESULT_MESSAGE`] when both are empty.
    pub fn from_response(sql: &str, exception: &str) -> Self {
        if !sql.trim().is_empty() && exception.is_empty() {
            Self::Succeeded {
                sql: sql.to_string(),
            }
        } else if exception.is_empty() {
            Self::failed(EMPTY_RESULT_MESSAGE)
        } else {
            Self::failed(exception)
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Number of chunks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkCounts {
    pub waiting: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ChunkCounts {
    pub fn tally<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Self {
        chunks
            .into_iter()
            .fold(Self::default(), |mut counts, chunk| {
                match chunk.status {
                    ChunkStatus::Waiting => counts.waiting += 1,
                    ChunkStatus::Running => counts.running += 1,
                    ChunkStatus::Succeeded => counts.succeeded += 1,
                    ChunkStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    pub fn total(&self) -> usize {
        self.waiting + self.running + self.succeeded + self.failed
    }
}
