//! Ordered collection of chunks for one registry generation.

use super::model::{Chunk, ChunkCounts, ChunkStatus};
use super::splitter;
use serde::{Deserialize, Serialize};

/// Owns the chunks produced by the latest rebuild.
///
/// A rebuild discards every chunk and bumps `generation`, so identities from
/// an older generation can never be written back into the new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRegistry {
    #[serde(default)]
    generation: u64,
    #[serde(default)]
    chunks: Vec<Chunk>,
}

impl ChunkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a registry from persisted parts.
    pub fn from_parts(generation: u64, chunks: Vec<Chunk>) -> Self {
        Self { generation, chunks }
    }

    /// Replaces all chunks with a fresh WAITING generation built from `source_text`.
    pub fn rebuild(&mut self, source_text: &str, merge_factor: usize, session_id: &str) -> &[Chunk] {
        self.generation += 1;
        self.chunks = splitter::split(source_text, merge_factor)
            .into_iter()
            .enumerate()
            .map(|(index, source)| {
                Chunk::new(
                    format!("{session_id}:{index}"),
                    index,
                    splitter::guess_name(&source),
                    source,
                )
            })
            .collect();
        tracing::debug!(
            generation = self.generation,
            chunks = self.chunks.len(),
            "Chunk registry rebuilt"
        );
        &self.chunks
    }

    /// Drops every chunk. Counts as a new generation.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.chunks.clear();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut Chunk> {
        self.chunks.iter_mut().find(|c| c.id == id)
    }

    /// Ids of chunks currently in `status`, in index order.
    pub fn ids_with_status(&self, status: ChunkStatus) -> Vec<String> {
        self.chunks
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.id.clone()).collect()
    }

    pub fn counts(&self) -> ChunkCounts {
        ChunkCounts::tally(&self.chunks)
    }

    /// True when there is at least one chunk and all of them succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(Chunk::is_succeeded)
    }

    pub fn any_failed(&self) -> bool {
        self.chunks.iter().any(Chunk::is_failed)
    }

    /// Marks every RUNNING chunk as interrupted. Returns how many changed.
    pub fn interrupt_running(&mut self) -> usize {
        let mut interrupted = 0;
        for chunk in &mut self.chunks {
            if chunk.interrupt() {
                interrupted += 1;
            }
        }
        interrupted
    }
}
