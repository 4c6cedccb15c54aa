//! Session domain model.
//!
//! The session is the unit of persistence: parameters, documents, the shared
//! prompt, lock flags and the chunk registry all travel together.

use super::params::ConversionParameters;
use crate::chunk::{Chunk, ChunkRegistry};
use crate::error::{ChunkError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE_FILE_NAME: &str = "input.sql";

static FORBIDDEN_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid file name regex"));

/// A named text document (source script or reference template).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Coarse state of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Parameters and documents are editable.
    Unlocked,
    /// Locked, shared prompt not generated yet.
    PromptPending,
    /// Locked with a shared prompt; chunks may be dispatched.
    PromptReady,
}

/// An exported conversion result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub content: String,
}

/// One conversion session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub params: ConversionParameters,
    pub source: SourceDocument,
    /// Optional reference document, only fed to prompt generation
    pub template: Option<SourceDocument>,
    /// Raw prompt typed by the user
    pub user_prompt: String,
    /// Generated shared prompt, empty until generation succeeds
    pub prompt_text: String,
    pub params_locked: bool,
    pub auto_dispatch_after_prompt: bool,
    pub registry: ChunkRegistry,
}

impl Session {
    /// Creates an Unlocked session without documents or chunks.
    pub fn new(id: impl Into<String>, params: ConversionParameters) -> Self {
        Self {
            id: id.into(),
            params,
            source: SourceDocument::new(DEFAULT_SOURCE_FILE_NAME, ""),
            template: None,
            user_prompt: String::new(),
            prompt_text: String::new(),
            params_locked: false,
            auto_dispatch_after_prompt: false,
            registry: ChunkRegistry::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.params_locked {
            SessionPhase::Unlocked
        } else if self.prompt_text.trim().is_empty() {
            SessionPhase::PromptPending
        } else {
            SessionPhase::PromptReady
        }
    }

    pub fn is_prompt_ready(&self) -> bool {
        self.phase() == SessionPhase::PromptReady
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.registry.chunks()
    }

    pub fn template_text(&self) -> &str {
        self.template.as_ref().map(|t| t.text.as_str()).unwrap_or("")
    }

    /// Rebuilds the chunk registry from the current source and parameters.
    pub fn rebuild_chunks(&mut self) -> usize {
        let merge_n = self.params.merge_n;
        self.registry
            .rebuild(&self.source.text, merge_n, &self.id)
            .len()
    }

    /// Forces RUNNING chunks to FAILED after a reload. Returns how many changed.
    pub fn recover_interrupted(&mut self) -> usize {
        self.registry.interrupt_running()
    }

    /// Builds the export file once every chunk succeeded.
    pub fn export(&self) -> Result<ExportFile> {
        if !self.registry.all_succeeded() {
            return Err(ChunkError::validation(
                "export requires every chunk to have succeeded",
            ));
        }

        let destination = match self.params.destination_format.trim() {
            "" => "output".to_string(),
            other => other.to_lowercase(),
        };
        let file_name = sanitize_file_name(&format!(
            "{}_to_{}.sql",
            file_stem(&self.source.name),
            destination
        ));
        let content = self
            .registry
            .chunks()
            .iter()
            .map(|c| c.destination.trim())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ExportFile { file_name, content })
    }
}

fn file_stem(name: &str) -> &str {
    let name = if name.is_empty() { "input" } else { name };
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".sql") || lower.ends_with(".txt") {
        &name[..name.len() - 4]
    } else {
        name
    }
}

/// Each run of forbidden characters becomes a single `_`.
fn sanitize_file_name(name: &str) -> String {
    FORBIDDEN_FILE_CHARS.replace_all(name, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkOutcome;

    fn locked_session() -> Session {
        let mut session = Session::new(
            "sess",
            ConversionParameters {
                source_format: "gbase8c".to_string(),
                destination_format: "GBaseHD".to_string(),
                ..Default::default()
            },
        );
        session.source = SourceDocument::new(
            "finance.sql",
            "CREATE TABLE a (x int); CREATE TABLE b (y int);",
        );
        session.params_locked = true;
        session.rebuild_chunks();
        session
    }

    #[test]
    fn test_phase_transitions() {
        let mut session = Session::new("s", ConversionParameters::default());
        assert_eq!(session.phase(), SessionPhase::Unlocked);
        session.params_locked = true;
        assert_eq!(session.phase(), SessionPhase::PromptPending);
        session.prompt_text = "  ".to_string();
        assert_eq!(session.phase(), SessionPhase::PromptPending);
        session.prompt_text = "convert".to_string();
        assert_eq!(session.phase(), SessionPhase::PromptReady);
    }

    #[test]
    fn test_export_requires_all_succeeded() {
        let session = locked_session();
        assert!(session.export().unwrap_err().is_validation());
    }

    #[test]
    fn test_export_joins_in_index_order() {
        let mut session = locked_session();
        for (i, chunk) in session.registry.chunks_mut().iter_mut().enumerate() {
            chunk.apply(ChunkOutcome::Succeeded {
                sql: format!("  out{i};\n"),
            });
        }
        let export = session.export().unwrap();
        assert_eq!(export.file_name, "finance_to_gbasehd.sql");
        assert_eq!(export.content, "out0;\n\nout1;");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a/b:c?.sql"), "a_b_c_.sql");
        assert_eq!(sanitize_file_name("a//b"), "a_b");
        assert_eq!(sanitize_file_name(r#"x\\:*?"<>|y.sql"#), "x_y.sql");
        assert_eq!(file_stem("x.TXT"), "x");
        assert_eq!(file_stem(""), "input");
    }
}
