//! Session snapshot DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlchunk_core::chunk::{Chunk, ChunkRegistry, ChunkStatus};
use sqlchunk_core::session::{
    ConversionParameters, DEFAULT_CONCURRENCY, DEFAULT_MERGE_N, SNAPSHOT_KEY, Session,
    SourceDocument,
};

/// The only snapshot version this build reads and writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Reads just the version tag of a stored snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotProbe {
    #[serde(default)]
    pub version: Option<i64>,
}

impl SnapshotProbe {
    pub fn is_supported(&self) -> bool {
        self.version == Some(i64::from(SNAPSHOT_VERSION))
    }
}

fn default_merge_n() -> usize {
    DEFAULT_MERGE_N
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// V1 conversion parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParametersV1 {
    #[serde(default)]
    pub source_format: String,
    #[serde(default)]
    pub destination_format: String,
    #[serde(default)]
    pub target_schema: String,
    #[serde(default)]
    pub destination_sql_language: String,
    #[serde(default = "default_merge_n")]
    pub merge_n: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl From<&ConversionParameters> for ParametersV1 {
    fn from(params: &ConversionParameters) -> Self {
        Self {
            source_format: params.source_format.clone(),
            destination_format: params.destination_format.clone(),
            target_schema: params.target_schema.clone(),
            destination_sql_language: params.destination_sql_language.clone(),
            merge_n: params.merge_n,
            concurrency: params.concurrency,
        }
    }
}

impl From<ParametersV1> for ConversionParameters {
    fn from(dto: ParametersV1) -> Self {
        Self {
            source_format: dto.source_format,
            destination_format: dto.destination_format,
            target_schema: dto.target_schema,
            destination_sql_language: dto.destination_sql_language,
            merge_n: dto.merge_n.max(1),
            concurrency: dto.concurrency.max(1),
        }
    }
}

/// V1 chunk record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkV1 {
    pub id: String,
    pub index: usize,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub status: ChunkStatus,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub prompt_override: String,
}

impl From<&Chunk> for ChunkV1 {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            index: chunk.index,
            name: chunk.name.clone(),
            source: chunk.source.clone(),
            destination: chunk.destination.clone(),
            status: chunk.status,
            error: chunk.error.clone(),
            prompt_override: chunk.prompt_override.clone(),
        }
    }
}

impl From<ChunkV1> for Chunk {
    fn from(dto: ChunkV1) -> Self {
        let mut chunk = Chunk::new(dto.id, dto.index, dto.name, dto.source);
        chunk.destination = dto.destination;
        chunk.status = dto.status;
        chunk.error = dto.error;
        chunk.prompt_override = dto.prompt_override;
        chunk
    }
}

/// V1 session snapshot.
///
/// Scalar fields come first so the TOML document keeps its tables last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshotV1 {
    pub version: u32,
    #[serde(default = "default_key")]
    pub key: String,
    pub session_id: String,
    /// When this snapshot was written
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_file_name: String,
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub template_text: Option<String>,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub params_locked: bool,
    #[serde(default)]
    pub auto_dispatch_after_prompt: bool,
    #[serde(default)]
    pub chunk_generation: u64,
    pub params: ParametersV1,
    #[serde(default)]
    pub chunks: Vec<ChunkV1>,
}

fn default_key() -> String {
    SNAPSHOT_KEY.to_string()
}

impl From<&Session> for SessionSnapshotV1 {
    fn from(session: &Session) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            key: SNAPSHOT_KEY.to_string(),
            session_id: session.id.clone(),
            saved_at: Some(Utc::now()),
            source_file_name: session.source.name.clone(),
            source_text: session.source.text.clone(),
            template_name: session.template.as_ref().map(|t| t.name.clone()),
            template_text: session.template.as_ref().map(|t| t.text.clone()),
            user_prompt: session.user_prompt.clone(),
            prompt_text: session.prompt_text.clone(),
            params_locked: session.params_locked,
            auto_dispatch_after_prompt: session.auto_dispatch_after_prompt,
            chunk_generation: session.registry.generation(),
            params: ParametersV1::from(&session.params),
            chunks: session.chunks().iter().map(ChunkV1::from).collect(),
        }
    }
}

impl From<SessionSnapshotV1> for Session {
    fn from(dto: SessionSnapshotV1) -> Self {
        let mut session = Session::new(dto.session_id, dto.params.into());
        if !dto.source_file_name.is_empty() {
            session.source.name = dto.source_file_name;
        }
        session.source.text = dto.source_text;
        session.template = match (dto.template_name, dto.template_text) {
            (None, None) => None,
            (name, text) => Some(SourceDocument::new(
                name.unwrap_or_default(),
                text.unwrap_or_default(),
            )),
        };
        session.user_prompt = dto.user_prompt;
        session.prompt_text = dto.prompt_text;
        session.params_locked = dto.params_locked;
        session.auto_dispatch_after_prompt = dto.auto_dispatch_after_prompt;

        let mut chunks: Vec<Chunk> = dto.chunks.into_iter().map(Chunk::from).collect();
        chunks.sort_by_key(|c| c.index);
        session.registry = ChunkRegistry::from_parts(dto.chunk_generation, chunks);
        session
    }
}
