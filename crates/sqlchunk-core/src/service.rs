//! Remote conversion collaborator contract.
//!
//! The wire shapes below are what the remote service consumes and produces.
//! Its internals are opaque; only these request/response pairs matter.

use crate::chunk::Chunk;
use crate::session::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one collaborator call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The call could not complete (connection refused, reset, unreadable body).
    #[error("{0}")]
    Transport(String),

    /// The service answered with a structured error detail.
    #[error("{message}")]
    Service { status: Option<u16>, message: String },

    /// The service answered with a shape the caller did not expect.
    #[error("unexpected response: {0}")]
    UnexpectedShape(String),
}

/// Previous result of one chunk, sent as context to prompt generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorChunkResult {
    pub sql: String,
    pub exception: String,
}

/// Body of `normalize_prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizePromptRequest {
    pub task_id: String,
    /// The user prompt to normalize into a shared prompt
    pub general_prompt: String,
    pub source_format: String,
    pub destination_format: String,
    pub destination_sql_language: String,
    pub target_schema: String,
    pub merge_n: usize,
    pub source_sql: String,
    pub destination_example: String,
    pub chunked_sql: Vec<String>,
    pub result_chunks: Vec<PriorChunkResult>,
    pub result: String,
}

impl NormalizePromptRequest {
    /// Builds the request from the session's current state.
    pub fn from_session(session: &Session, user_prompt: &str) -> Self {
        let chunks = session.chunks();
        Self {
            task_id: session.id.clone(),
            general_prompt: user_prompt.to_string(),
            source_format: session.params.source_format.clone(),
            destination_format: session.params.destination_format.clone(),
            destination_sql_language: session.params.destination_sql_language.clone(),
            target_schema: session.params.target_schema.clone(),
            merge_n: session.params.merge_n,
            source_sql: session.source.text.clone(),
            destination_example: session.template_text().to_string(),
            chunked_sql: chunks.iter().map(|c| c.source.clone()).collect(),
            result_chunks: chunks
                .iter()
                .map(|c| PriorChunkResult {
                    sql: c.destination.clone(),
                    exception: c.error.clone(),
                })
                .collect(),
            result: chunks
                .iter()
                .map(|c| c.destination.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Successful body of `normalize_prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizePromptResponse {
    pub general_prompt: String,
}

/// Body of `convert_chunk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertChunkRequest {
    /// Chunk id
    pub task_id: String,
    /// Effective prompt: the chunk override when set, else the shared prompt
    pub general_prompt: String,
    pub source_format: String,
    pub destination_format: String,
    pub destination_sql_language: String,
    pub target_schema: String,
    pub destination_example: String,
    /// Source text of the chunk
    pub sql: String,
    /// Same as `general_prompt`, for services reading `prompt`
    pub prompt: String,
}

/// Session-wide fields copied into every `convert_chunk` call of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionContext {
    pub shared_prompt: String,
    pub source_format: String,
    pub destination_format: String,
    pub destination_sql_language: String,
    pub target_schema: String,
    pub destination_example: String,
}

impl ConversionContext {
    pub fn from_session(session: &Session) -> Self {
        Self {
            shared_prompt: session.prompt_text.clone(),
            source_format: session.params.source_format.clone(),
            destination_format: session.params.destination_format.clone(),
            destination_sql_language: session.params.destination_sql_language.clone(),
            target_schema: session.params.target_schema.clone(),
            destination_example: session.template_text().to_string(),
        }
    }

    /// Builds the request for one chunk.
    pub fn request_for(&self, chunk: &Chunk) -> ConvertChunkRequest {
        let prompt = chunk.effective_prompt(&self.shared_prompt).to_string();
        ConvertChunkRequest {
            task_id: chunk.id.clone(),
            general_prompt: prompt.clone(),
            source_format: self.source_format.clone(),
            destination_format: self.destination_format.clone(),
            destination_sql_language: self.destination_sql_language.clone(),
            target_schema: self.target_schema.clone(),
            destination_example: self.destination_example.clone(),
            sql: chunk.source.clone(),
            prompt,
        }
    }
}

/// Body of a `convert_chunk` answer. Missing fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertChunkResponse {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub exception: String,
}

/// The remote conversion/prompt-generation service.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Turns the user prompt into the shared prompt used for every chunk.
    async fn normalize_prompt(
        &self,
        request: &NormalizePromptRequest,
    ) -> Result<NormalizePromptResponse, ServiceError>;

    /// Converts one chunk.
    async fn convert_chunk(
        &self,
        request: &ConvertChunkRequest,
    ) -> Result<ConvertChunkResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConversionParameters, SourceDocument};

    fn session() -> Session {
        let mut session = Session::new(
            "sess",
            ConversionParameters {
                source_format: "mysql".to_string(),
                destination_format: "hive".to_string(),
                target_schema: "stg".to_string(),
                ..Default::default()
            },
        );
        session.source =
            SourceDocument::new("a.sql", "CREATE TABLE a (x int); CREATE TABLE b (y int);");
        session.template = Some(SourceDocument::new("tpl.sql", "CREATE TABLE t (...)"));
        session.prompt_text = "shared".to_string();
        session.rebuild_chunks();
        session
    }

    #[test]
    fn test_normalize_request_carries_chunk_list() {
        let s = session();
        let req = NormalizePromptRequest::from_session(&s, "make it hive");
        assert_eq!(req.task_id, "sess");
        assert_eq!(req.general_prompt, "make it hive");
        assert_eq!(req.chunked_sql.len(), 2);
        assert_eq!(req.result_chunks.len(), 2);
        assert_eq!(req.destination_example, "CREATE TABLE t (...)");
    }

    #[test]
    fn test_convert_request_uses_override() {
        let mut s = session();
        s.registry.chunks_mut()[1].prompt_override = "special".to_string();
        let ctx = ConversionContext::from_session(&s);

        let first = ctx.request_for(&s.chunks()[0]);
        assert_eq!(first.task_id, "sess:0");
        assert_eq!(first.general_prompt, "shared");
        assert_eq!(first.sql, "CREATE TABLE a (x int);");

        let second = ctx.request_for(&s.chunks()[1]);
        assert_eq!(second.general_prompt, "special");
        assert_eq!(second.prompt, "special");
    }

    #[test]
    fn test_convert_response_tolerates_missing_fields() {
        let resp: ConvertChunkResponse = serde_json::from_str(r#"{"sql":"x"}"#).unwrap();
        assert_eq!(resp.sql, "x");
        assert!(resp.exception.is_empty());
    }
}
