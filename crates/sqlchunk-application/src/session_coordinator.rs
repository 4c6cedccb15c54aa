//! Session coordinator implementation.
//!
//! The coordinator is the only writer of the session outside of a dispatch
//! run. Its state machine:
//!
//! ```text
//! Unlocked --confirm_parameters--> PromptPending --generate_prompt--> PromptReady
//!     ^                                  |                                 |
//!     +----------- edit_parameters ------+---------------------------------+
//! ```
//!
//! Top-level operations are serialized by a busy flag; a second operation
//! started while one is active fails with [`ChunkError::Busy`].

use sqlchunk_core::chunk::{ChunkCounts, ChunkStatus};
use sqlchunk_core::config::DefaultsConfig;
use sqlchunk_core::error::{ChunkError, Result};
use sqlchunk_core::service::{ConversionService, NormalizePromptRequest};
use sqlchunk_core::session::{
    ConversionParameters, ExportFile, Session, SessionPhase, SessionStore, SourceDocument, prompt,
};
use sqlchunk_execution::{Dispatcher, RunSummary};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Result of a successful prompt generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptGeneration {
    /// The shared prompt now in effect
    pub prompt_text: String,
    /// Number of chunks after the post-generation rebuild
    pub chunks: usize,
    /// Set when auto-dispatch ran a full conversion afterwards
    pub run: Option<RunSummary>,
}

/// Clears the busy flag on drop.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Drives one conversion session through its lifecycle.
pub struct SessionCoordinator {
    session: Arc<Mutex<Session>>,
    store: Arc<dyn SessionStore>,
    service: Arc<dyn ConversionService>,
    dispatcher: Dispatcher,
    busy: AtomicBool,
}

impl SessionCoordinator {
    pub fn new(
        session: Session,
        store: Arc<dyn SessionStore>,
        service: Arc<dyn ConversionService>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            dispatcher: Dispatcher::new(service.clone(), store.clone()),
            store,
            service,
            busy: AtomicBool::new(false),
        }
    }

    /// Restores the persisted session, or starts a fresh Unlocked one.
    ///
    /// Chunks found RUNNING in the snapshot are turned into FAILED chunks
    /// carrying the interruption message.
    pub async fn restore(
        store: Arc<dyn SessionStore>,
        service: Arc<dyn ConversionService>,
        defaults: &DefaultsConfig,
    ) -> Result<Self> {
        let session = match store.load().await? {
            Some(mut session) => {
                let interrupted = session.recover_interrupted();
                tracing::info!(
                    session_id = %session.id,
                    chunks = session.chunks().len(),
                    interrupted,
                    "Session restored"
                );
                session
            }
            None => {
                let session = Session::new(Uuid::new_v4().to_string(), defaults.initial_parameters());
                tracing::info!(session_id = %session.id, "Started new session");
                session
            }
        };
        Ok(Self::new(session, store, service))
    }

    fn acquire(&self, operation: &str) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ChunkError::busy(format!("cannot {operation} while another operation runs")))?;
        Ok(BusyGuard { flag: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    // ============================================================================
    // Read access
    // ============================================================================

    /// Returns a copy of the current session.
    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.session.lock().await.phase()
    }

    pub async fn counts(&self) -> ChunkCounts {
        self.session.lock().await.registry.counts()
    }

    /// Builds the export file; requires every chunk to have succeeded.
    pub async fn export(&self) -> Result<ExportFile> {
        self.session.lock().await.export()
    }

    // ============================================================================
    // Editing (Unlocked only)
    // ============================================================================

    fn ensure_unlocked(session: &Session, what: &str) -> Result<()> {
        if session.params_locked {
            return Err(ChunkError::validation(format!(
                "cannot change {what} while parameters are locked"
            )));
        }
        Ok(())
    }

    pub async fn set_parameters(&self, params: ConversionParameters) -> Result<()> {
        let _busy = self.acquire("set parameters")?;
        let mut session = self.session.lock().await;
        Self::ensure_unlocked(&session, "parameters")?;
        session.params = params.normalized();
        session.prompt_text.clear();
        Ok(())
    }

    /// Replaces the source document and discards every chunk.
    pub async fn load_source(&self, document: SourceDocument) -> Result<()> {
        let _busy = self.acquire("load a source document")?;
        let mut session = self.session.lock().await;
        Self::ensure_unlocked(&session, "the source document")?;
        session.source = document;
        session.registry.clear();
        session.prompt_text.clear();
        Ok(())
    }

    pub async fn load_template(&self, document: Option<SourceDocument>) -> Result<()> {
        let _busy = self.acquire("load a template document")?;
        let mut session = self.session.lock().await;
        Self::ensure_unlocked(&session, "the template document")?;
        session.template = document;
        session.prompt_text.clear();
        Ok(())
    }

    pub async fn set_user_prompt(&self, text: impl Into<String>) -> Result<()> {
        let _busy = self.acquire("edit the user prompt")?;
        self.session.lock().await.user_prompt = text.into();
        Ok(())
    }

    pub async fn set_auto_dispatch(&self, enabled: bool) -> Result<()> {
        let _busy = self.acquire("toggle auto-dispatch")?;
        self.session.lock().await.auto_dispatch_after_prompt = enabled;
        Ok(())
    }

    // ============================================================================
    // Lock / unlock
    // ============================================================================

    /// Validates and locks the parameters, then rebuilds chunks and persists.
    ///
    /// Returns the number of chunks. On a validation error nothing changes.
    pub async fn confirm_parameters(&self) -> Result<usize> {
        let _busy = self.acquire("confirm parameters")?;
        let mut session = self.session.lock().await;

        let params = session.params.normalized();
        params.validate()?;
        if session.source.is_blank() {
            return Err(ChunkError::validation(
                "parameter validation failed: a source SQL document is required",
            ));
        }
        let user_prompt = prompt::prepare_user_prompt(&session.user_prompt, &params)?;

        session.params = params;
        session.user_prompt = user_prompt;
        session.params_locked = true;
        session.prompt_text.clear();
        let chunks = session.rebuild_chunks();
        self.store.save(&session).await?;

        tracing::info!(session_id = %session.id, chunks, "Parameters confirmed");
        Ok(chunks)
    }

    /// Returns to Unlocked. Chunks stay as they are and nothing is persisted.
    pub async fn edit_parameters(&self) -> Result<()> {
        let _busy = self.acquire("edit parameters")?;
        let mut session = self.session.lock().await;
        session.params_locked = false;
        session.prompt_text.clear();
        tracing::info!(session_id = %session.id, "Parameters unlocked");
        Ok(())
    }

    // ============================================================================
    // Prompt generation
    // ============================================================================

    /// Generates the shared prompt from `user_prompt` (or the stored one).
    ///
    /// Chunks are rebuilt and persisted before the remote call and again
    /// after a successful answer. On failure the session stays PromptPending.
    pub async fn generate_prompt(&self, user_prompt: Option<String>) -> Result<PromptGeneration> {
        let _busy = self.acquire("generate the prompt")?;

        let request = {
            let mut session = self.session.lock().await;
            if !session.params_locked {
                return Err(ChunkError::validation(
                    "confirm the parameters before generating a prompt",
                ));
            }
            if session.source.is_blank() {
                return Err(ChunkError::validation("a source SQL document is required"));
            }
            let user_prompt = user_prompt.unwrap_or_else(|| session.user_prompt.clone());
            if user_prompt.trim().is_empty() {
                return Err(ChunkError::validation("the user prompt is empty"));
            }

            session.user_prompt = user_prompt;
            session.prompt_text.clear();
            session.rebuild_chunks();
            self.store.save(&session).await?;
            NormalizePromptRequest::from_session(&session, &session.user_prompt)
        };

        tracing::info!(task_id = %request.task_id, "Requesting shared prompt");
        let response = self.service.normalize_prompt(&request).await.map_err(|e| {
            tracing::warn!(error = %e, "Prompt generation failed");
            ChunkError::generation_failed(e.to_string())
        })?;

        let (prompt_text, chunks, auto_dispatch) = {
            let mut session = self.session.lock().await;
            session.prompt_text = response.general_prompt;
            let chunks = session.rebuild_chunks();
            self.store.save(&session).await?;
            (
                session.prompt_text.clone(),
                chunks,
                session.auto_dispatch_after_prompt,
            )
        };
        if prompt_text.trim().is_empty() {
            tracing::warn!(chunks, "Service returned an empty shared prompt");
        } else {
            tracing::info!(chunks, "Shared prompt ready");
        }

        let run = if auto_dispatch {
            self.run_all().await?
        } else {
            None
        };

        Ok(PromptGeneration {
            prompt_text,
            chunks,
            run,
        })
    }

    // ============================================================================
    // Chunk runs (PromptReady only, otherwise no-ops)
    // ============================================================================

    /// Converts every chunk that has not succeeded yet.
    pub async fn convert_all(&self) -> Result<Option<RunSummary>> {
        let _busy = self.acquire("convert all chunks")?;
        self.run_all().await
    }

    async fn run_all(&self) -> Result<Option<RunSummary>> {
        let (ids, limit) = {
            let mut session = self.session.lock().await;
            if !session.is_prompt_ready() {
                tracing::debug!("Convert all skipped: prompt not ready");
                return Ok(None);
            }
            for chunk in session.registry.chunks_mut() {
                if !chunk.is_succeeded() {
                    chunk.reset();
                }
            }
            (session.registry.ids(), session.params.concurrency)
        };

        self.dispatcher
            .run(&self.session, &ids, limit)
            .await
            .map(Some)
    }

    /// Re-dispatches exactly the FAILED chunks.
    pub async fn redo_failed(&self) -> Result<Option<RunSummary>> {
        let _busy = self.acquire("redo failed chunks")?;

        let (ids, limit) = {
            let mut session = self.session.lock().await;
            if !session.is_prompt_ready() {
                return Ok(None);
            }
            let ids = session.registry.ids_with_status(ChunkStatus::Failed);
            for id in &ids {
                if let Some(chunk) = session.registry.find_by_id_mut(id) {
                    chunk.reset();
                }
            }
            (ids, session.params.concurrency)
        };

        tracing::info!(failed = ids.len(), "Redoing failed chunks");
        self.dispatcher
            .run(&self.session, &ids, limit)
            .await
            .map(Some)
    }

    /// Redoes one chunk, optionally replacing its prompt override first.
    pub async fn redo_one(
        &self,
        id: &str,
        prompt_override: Option<String>,
    ) -> Result<Option<RunSummary>> {
        let _busy = self.acquire("redo a chunk")?;

        {
            let mut session = self.session.lock().await;
            if !session.is_prompt_ready() {
                return Ok(None);
            }
            let chunk = session
                .registry
                .find_by_id_mut(id)
                .ok_or_else(|| ChunkError::not_found("Chunk", id))?;
            if let Some(text) = prompt_override {
                chunk.prompt_override = text;
            }
            chunk.reset();
        }

        let ids = [id.to_string()];
        self.dispatcher.run(&self.session, &ids, 1).await.map(Some)
    }

    /// Stores a per-chunk prompt override; effective from the next dispatch.
    pub async fn set_prompt_override(&self, id: &str, text: impl Into<String>) -> Result<()> {
        let _busy = self.acquire("set a prompt override")?;
        let mut session = self.session.lock().await;
        if !session.is_prompt_ready() {
            return Err(ChunkError::validation(
                "prompt overrides require a generated prompt",
            ));
        }
        let chunk = session
            .registry
            .find_by_id_mut(id)
            .ok_or_else(|| ChunkError::not_found("Chunk", id))?;
        chunk.prompt_override = text.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sqlchunk_core::chunk::{ChunkOutcome, INTERRUPTED_MESSAGE};
    use sqlchunk_core::service::{
        ConvertChunkRequest, ConvertChunkResponse, NormalizePromptResponse, ServiceError,
    };
    use sqlchunk_infrastructure::TomlSessionStore;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const SQL: &str = "CREATE TABLE a (x int);\nCREATE TABLE bad_b (y int);\nCREATE TABLE c (z int);";

    /// Fails chunks whose source contains `fail_marker`; prompts are echoed back.
    struct MockService {
        fail_marker: StdMutex<String>,
        normalize_error: StdMutex<Option<ServiceError>>,
        general_prompt: StdMutex<Option<String>>,
        convert_calls: StdMutex<Vec<(String, String)>>,
        normalize_calls: AtomicUsize,
    }

    impl MockService {
        fn new() -> Self {
            Self {
                fail_marker: StdMutex::new("bad".to_string()),
                normalize_error: StdMutex::new(None),
                general_prompt: StdMutex::new(None),
                convert_calls: StdMutex::new(Vec::new()),
                normalize_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.convert_calls
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _)| id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ConversionService for MockService {
        async fn normalize_prompt(
            &self,
            request: &NormalizePromptRequest,
        ) -> std::result::Result<NormalizePromptResponse, ServiceError> {
            self.normalize_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.normalize_error.lock().unwrap().clone() {
                return Err(err);
            }
            let general_prompt = self
                .general_prompt
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| format!("shared: {}", request.general_prompt));
            Ok(NormalizePromptResponse { general_prompt })
        }

        async fn convert_chunk(
            &self,
            request: &ConvertChunkRequest,
        ) -> std::result::Result<ConvertChunkResponse, ServiceError> {
            self.convert_calls
                .lock()
                .unwrap()
                .push((request.task_id.clone(), request.general_prompt.clone()));
            let marker = self.fail_marker.lock().unwrap().clone();
            if !marker.is_empty() && request.sql.contains(&marker) {
                return Ok(ConvertChunkResponse {
                    sql: String::new(),
                    exception: format!("cannot convert {}", request.task_id),
                });
            }
            Ok(ConvertChunkResponse {
                sql: format!("-- {}", request.task_id),
                exception: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        saved: StdMutex<Option<Session>>,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn load(&self) -> Result<Option<Session>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save(&self, session: &Session) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            *self.saved.lock().unwrap() = None;
            Ok(())
        }
    }

    fn params() -> ConversionParameters {
        ConversionParameters {
            source_format: "gbase8c".to_string(),
            destination_format: "gbasehd".to_string(),
            concurrency: 2,
            ..Default::default()
        }
    }

    async fn coordinator() -> (SessionCoordinator, Arc<MockService>, Arc<MemoryStore>) {
        let service = Arc::new(MockService::new());
        let store = Arc::new(MemoryStore::default());
        let coordinator =
            SessionCoordinator::restore(store.clone(), service.clone(), &DefaultsConfig::default())
                .await
                .unwrap();
        coordinator.set_parameters(params()).await.unwrap();
        coordinator
            .load_source(SourceDocument::new("finance.sql", SQL))
            .await
            .unwrap();
        (coordinator, service, store)
    }

    async fn ready() -> (SessionCoordinator, Arc<MockService>, Arc<MemoryStore>) {
        let (coordinator, service, store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();
        coordinator
            .generate_prompt(Some("convert it".to_string()))
            .await
            .unwrap();
        (coordinator, service, store)
    }

    #[tokio::test]
    async fn test_confirm_rejects_missing_destination_format() {
        let (coordinator, _service, store) = coordinator().await;
        let mut p = params();
        p.destination_format.clear();
        coordinator.set_parameters(p).await.unwrap();

        let err = coordinator.confirm_parameters().await.unwrap_err();
        assert!(err.is_validation());
        let session = coordinator.snapshot().await;
        assert!(!session.params_locked);
        assert!(session.chunks().is_empty());
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confirm_requires_source() {
        let (coordinator, _service, _store) = coordinator().await;
        coordinator
            .load_source(SourceDocument::new("empty.sql", "  \n"))
            .await
            .unwrap();

        let err = coordinator.confirm_parameters().await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(coordinator.phase().await, SessionPhase::Unlocked);
    }

    #[tokio::test]
    async fn test_confirm_locks_rebuilds_and_persists() {
        let (coordinator, _service, store) = coordinator().await;

        let chunks = coordinator.confirm_parameters().await.unwrap();
        assert_eq!(chunks, 3);
        assert_eq!(coordinator.phase().await, SessionPhase::PromptPending);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);

        let session = coordinator.snapshot().await;
        assert!(session.user_prompt.contains("from [gbase8c] to [gbasehd]"));
        assert_eq!(store.saved.lock().unwrap().as_ref(), Some(&session));
    }

    #[tokio::test]
    async fn test_editing_is_rejected_while_locked() {
        let (coordinator, _service, _store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();

        assert!(coordinator.set_parameters(params()).await.unwrap_err().is_validation());
        assert!(
            coordinator
                .load_source(SourceDocument::new("x.sql", "CREATE TABLE x;"))
                .await
                .unwrap_err()
                .is_validation()
        );
    }

    #[tokio::test]
    async fn test_edit_parameters_keeps_chunks_and_does_not_persist() {
        let (coordinator, _service, store) = ready().await;
        let saves = store.saves.load(Ordering::SeqCst);

        coordinator.edit_parameters().await.unwrap();
        let session = coordinator.snapshot().await;
        assert_eq!(session.phase(), SessionPhase::Unlocked);
        assert!(session.prompt_text.is_empty());
        assert_eq!(session.chunks().len(), 3);
        assert_eq!(store.saves.load(Ordering::SeqCst), saves);
    }

    #[tokio::test]
    async fn test_load_source_discards_chunks() {
        let (coordinator, _service, _store) = ready().await;
        coordinator.edit_parameters().await.unwrap();

        coordinator
            .load_source(SourceDocument::new("other.sql", "CREATE TABLE o (x int);"))
            .await
            .unwrap();
        assert!(coordinator.snapshot().await.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_generate_prompt_checkpoints_before_and_after() {
        let (coordinator, service, store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();
        let generation = coordinator.snapshot().await.registry.generation();

        let result = coordinator
            .generate_prompt(Some("convert it".to_string()))
            .await
            .unwrap();

        assert_eq!(result.prompt_text, "shared: convert it");
        assert_eq!(result.chunks, 3);
        assert!(result.run.is_none());
        assert_eq!(coordinator.phase().await, SessionPhase::PromptReady);
        assert_eq!(store.saves.load(Ordering::SeqCst), 3);
        assert_eq!(service.normalize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            coordinator.snapshot().await.registry.generation(),
            generation + 2
        );
    }

    #[tokio::test]
    async fn test_generate_prompt_failure_stays_pending() {
        let (coordinator, service, store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();
        *service.normalize_error.lock().unwrap() = Some(ServiceError::UnexpectedShape(
            "no general_prompt".to_string(),
        ));

        let err = coordinator
            .generate_prompt(Some("convert it".to_string()))
            .await
            .unwrap_err();
        assert!(err.is_generation_failed());

        let session = coordinator.snapshot().await;
        assert_eq!(session.phase(), SessionPhase::PromptPending);
        assert_eq!(session.chunks().len(), 3);
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
        assert_eq!(store.saved.lock().unwrap().as_ref(), Some(&session));
    }

    #[tokio::test]
    async fn test_empty_shared_prompt_keeps_session_pending() {
        let (coordinator, service, store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();
        coordinator.set_auto_dispatch(true).await.unwrap();
        *service.general_prompt.lock().unwrap() = Some(String::new());

        let result = coordinator
            .generate_prompt(Some("convert it".to_string()))
            .await
            .unwrap();

        assert!(result.prompt_text.is_empty());
        assert_eq!(result.chunks, 3);
        assert!(result.run.is_none());
        assert_eq!(coordinator.phase().await, SessionPhase::PromptPending);
        assert_eq!(store.saves.load(Ordering::SeqCst), 3);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_prompt_requires_lock_and_text() {
        let (coordinator, service, _store) = coordinator().await;
        let err = coordinator
            .generate_prompt(Some("x".to_string()))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        coordinator.confirm_parameters().await.unwrap();
        let err = coordinator
            .generate_prompt(Some("   ".to_string()))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(service.normalize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chunk_operations_are_noops_before_prompt_ready() {
        let (coordinator, service, _store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();

        assert_eq!(coordinator.convert_all().await.unwrap(), None);
        assert_eq!(coordinator.redo_failed().await.unwrap(), None);
        let id = coordinator.snapshot().await.chunks()[0].id.clone();
        assert_eq!(coordinator.redo_one(&id, None).await.unwrap(), None);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_convert_all_then_resume_only_redispatches_unfinished() {
        let (coordinator, service, _store) = ready().await;

        let first = coordinator.convert_all().await.unwrap().unwrap();
        assert_eq!(first.dispatched, 3);
        assert_eq!(first.succeeded, 2);
        assert_eq!(first.failed, 1);
        let before = coordinator.snapshot().await;

        *service.fail_marker.lock().unwrap() = String::new();
        let second = coordinator.convert_all().await.unwrap().unwrap();
        assert_eq!(second.dispatched, 1);
        assert_eq!(second.succeeded, 1);

        let after = coordinator.snapshot().await;
        assert_eq!(after.chunks()[0], before.chunks()[0]);
        assert_eq!(after.chunks()[2], before.chunks()[2]);
        assert!(after.registry.all_succeeded());
        assert_eq!(service.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_redo_failed_touches_only_failed_chunks() {
        let (coordinator, service, _store) = ready().await;
        coordinator.convert_all().await.unwrap();
        {
            let mut session = coordinator.session.lock().await;
            session.registry.chunks_mut()[2].reset();
        }
        let before = coordinator.snapshot().await;
        assert_eq!(before.chunks()[1].status, ChunkStatus::Failed);
        service.convert_calls.lock().unwrap().clear();

        let summary = coordinator.redo_failed().await.unwrap().unwrap();
        assert_eq!(summary.dispatched, 1);

        let after = coordinator.snapshot().await;
        assert_eq!(after.chunks()[0], before.chunks()[0]);
        assert_eq!(after.chunks()[2], before.chunks()[2]);
        assert_eq!(after.chunks()[2].status, ChunkStatus::Waiting);
        assert_eq!(service.calls(), vec![before.chunks()[1].id.clone()]);
    }

    #[tokio::test]
    async fn test_redo_one_with_override() {
        let (coordinator, service, _store) = ready().await;
        coordinator.convert_all().await.unwrap();
        let id = coordinator.snapshot().await.chunks()[0].id.clone();
        service.convert_calls.lock().unwrap().clear();

        let summary = coordinator
            .redo_one(&id, Some("special".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(
            service.convert_calls.lock().unwrap().clone(),
            vec![(id.clone(), "special".to_string())]
        );
        assert_eq!(coordinator.snapshot().await.chunks()[0].prompt_override, "special");
    }

    #[tokio::test]
    async fn test_redo_one_unknown_chunk() {
        let (coordinator, _service, _store) = ready().await;
        let err = coordinator.redo_one("nope:9", None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_prompt_override_requires_prompt_ready() {
        let (coordinator, _service, _store) = coordinator().await;
        coordinator.confirm_parameters().await.unwrap();
        let id = coordinator.snapshot().await.chunks()[0].id.clone();
        assert!(
            coordinator
                .set_prompt_override(&id, "x")
                .await
                .unwrap_err()
                .is_validation()
        );
    }

    #[tokio::test]
    async fn test_auto_dispatch_after_prompt() {
        let (coordinator, service, _store) = coordinator().await;
        coordinator.set_auto_dispatch(true).await.unwrap();
        coordinator.confirm_parameters().await.unwrap();

        let result = coordinator
            .generate_prompt(Some("convert it".to_string()))
            .await
            .unwrap();
        let run = result.run.unwrap();
        assert_eq!(run.dispatched, 3);
        assert_eq!(service.calls().len(), 3);
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn test_second_operation_is_rejected_while_busy() {
        let (coordinator, _service, _store) = coordinator().await;
        let guard = coordinator.acquire("test").unwrap();

        let err = coordinator.confirm_parameters().await.unwrap_err();
        assert!(err.is_busy());
        drop(guard);
        assert!(coordinator.confirm_parameters().await.is_ok());
    }

    #[tokio::test]
    async fn test_export_after_all_succeeded() {
        let (coordinator, service, _store) = ready().await;
        *service.fail_marker.lock().unwrap() = String::new();
        assert!(coordinator.export().await.unwrap_err().is_validation());

        coordinator.convert_all().await.unwrap();
        let export = coordinator.export().await.unwrap();
        let session = coordinator.snapshot().await;
        assert_eq!(export.file_name, "finance_to_gbasehd.sql");
        assert_eq!(
            export.content,
            format!(
                "-- {}\n\n-- {}\n\n-- {}",
                session.chunks()[0].id,
                session.chunks()[1].id,
                session.chunks()[2].id
            )
        );
    }

    #[tokio::test]
    async fn test_restore_recovers_running_chunks_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.toml");
        let store = Arc::new(TomlSessionStore::new(&path));

        let mut session = Session::new("sess", params());
        session.source = SourceDocument::new("finance.sql", SQL);
        session.params_locked = true;
        session.prompt_text = "shared".to_string();
        session.rebuild_chunks();
        session.registry.chunks_mut()[0].apply(ChunkOutcome::Succeeded {
            sql: "done".to_string(),
        });
        session.registry.chunks_mut()[1].mark_running();
        session.registry.chunks_mut()[2].mark_running();
        store.save(&session).await.unwrap();

        let coordinator = SessionCoordinator::restore(
            store,
            Arc::new(MockService::new()),
            &DefaultsConfig::default(),
        )
        .await
        .unwrap();

        let restored = coordinator.snapshot().await;
        assert_eq!(restored.id, "sess");
        let counts = restored.registry.counts();
        assert_eq!(counts.running, 0);
        assert_eq!(counts.failed, 2);
        for chunk in &restored.chunks()[1..] {
            assert_eq!(chunk.error, INTERRUPTED_MESSAGE);
            assert!(chunk.destination.is_empty());
        }
        assert_eq!(restored.chunks()[0].destination, "done");
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_starts_unlocked() {
        let store = Arc::new(MemoryStore::default());
        let defaults = DefaultsConfig {
            merge_n: 2,
            concurrency: 8,
        };
        let coordinator =
            SessionCoordinator::restore(store, Arc::new(MockService::new()), &defaults)
                .await
                .unwrap();

        let session = coordinator.snapshot().await;
        assert_eq!(session.phase(), SessionPhase::Unlocked);
        assert_eq!(session.params.merge_n, 2);
        assert_eq!(session.params.concurrency, 8);
        assert!(!session.id.is_empty());
    }
}
