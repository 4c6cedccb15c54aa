//! Dispatcher - runs chunk conversions with a bounded number of calls in flight.
//!
//! A run spawns `min(limit, ids)` workers that share one cursor over the id
//! list. Each worker claims the next id, converts it and checkpoints the
//! session before claiming again, so at most `limit` calls are outstanding.

use futures::future::join_all;
use serde::Serialize;
use sqlchunk_core::chunk::ChunkOutcome;
use sqlchunk_core::error::Result;
use sqlchunk_core::service::{
    ConversionContext, ConversionService, ConvertChunkResponse, ServiceError,
};
use sqlchunk_core::session::{Session, SessionStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::Instrument;

/// Outcome counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Chunks actually sent to the service
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct RunCounters {
    dispatched: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl RunCounters {
    fn summary(&self) -> RunSummary {
        RunSummary {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Sends chunks to the conversion service and records their outcomes.
pub struct Dispatcher {
    service: Arc<dyn ConversionService>,
    store: Arc<dyn SessionStore>,
}

impl Dispatcher {
    pub fn new(service: Arc<dyn ConversionService>, store: Arc<dyn SessionStore>) -> Self {
        Self { service, store }
    }

    /// Converts the chunks named by `ids`, in order, with at most `limit` in flight.
    ///
    /// Chunks that already succeeded or no longer exist are skipped. A failing
    /// chunk never stops the others. Returns once every claimed chunk settled.
    pub async fn run(
        &self,
        session: &Arc<Mutex<Session>>,
        ids: &[String],
        limit: usize,
    ) -> Result<RunSummary> {
        if ids.is_empty() {
            return Ok(RunSummary::default());
        }

        let workers = limit.clamp(1, ids.len());
        let (context, generation) = {
            let guard = session.lock().await;
            (
                ConversionContext::from_session(&guard),
                guard.registry.generation(),
            )
        };

        let cursor = AtomicUsize::new(0);
        let counters = RunCounters::default();
        let span = tracing::info_span!("dispatch_run", chunks = ids.len(), workers);

        async {
            join_all((0..workers).map(|_| {
                self.worker(session, ids, &cursor, &context, generation, &counters)
            }))
            .await;
        }
        .instrument(span)
        .await;

        let summary = counters.summary();
        tracing::info!(
            dispatched = summary.dispatched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Dispatch run finished"
        );
        Ok(summary)
    }

    async fn worker(
        &self,
        session: &Arc<Mutex<Session>>,
        ids: &[String],
        cursor: &AtomicUsize,
        context: &ConversionContext,
        generation: u64,
        counters: &RunCounters,
    ) {
        loop {
            let position = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(id) = ids.get(position) else {
                break;
            };

            let request = {
                let mut guard = session.lock().await;
                if guard.registry.generation() != generation {
                    tracing::debug!(chunk_id = %id, "Registry rebuilt during run, stopping worker");
                    break;
                }
                let Some(chunk) = guard.registry.find_by_id_mut(id) else {
                    continue;
                };
                if chunk.is_succeeded() {
                    continue;
                }
                chunk.mark_running();
                context.request_for(chunk)
            };
            counters.dispatched.fetch_add(1, Ordering::SeqCst);

            let outcome = outcome_of(self.service.convert_chunk(&request).await);
            if outcome.is_succeeded() {
                counters.succeeded.fetch_add(1, Ordering::SeqCst);
            } else {
                counters.failed.fetch_add(1, Ordering::SeqCst);
            }

            let mut guard = session.lock().await;
            if guard.registry.generation() != generation {
                tracing::debug!(chunk_id = %id, "Discarding outcome for a rebuilt registry");
                break;
            }
            if let Some(chunk) = guard.registry.find_by_id_mut(id) {
                if let ChunkOutcome::Failed { error } = &outcome {
                    tracing::warn!(chunk_id = %id, error = %error, "Chunk conversion failed");
                }
                chunk.apply(outcome);
            }
            if let Err(e) = self.store.save(&guard).await {
                tracing::error!(chunk_id = %id, error = %e, "Failed to checkpoint session");
            }
        }
    }
}

/// Maps one service answer onto the chunk outcome.
fn outcome_of(result: std::result::Result<ConvertChunkResponse, ServiceError>) -> ChunkOutcome {
    match result {
        Ok(response) => ChunkOutcome::from_response(&response.sql, &response.exception),
        Err(ServiceError::Transport(message)) => ChunkOutcome::failed(message),
        Err(ServiceError::Service { message, .. }) => ChunkOutcome::failed(message),
        Err(err @ ServiceError::UnexpectedShape(_)) => ChunkOutcome::failed(err.to_string()),
    }
}
