//! Queue-backed AppendEntries endpoint.
//!
//! `PipelinedEndpoint` overrides the reference-counted AppendEntries form:
//! each request is retained, queued, and handled by a single worker task in
//! arrival order. The worker sends the reply first and releases the request
//! afterwards, so callers may observe a reply while the request is still
//! retained.
//!
//! # Design
//!
//! ```text
//! append_entries_ref(&req)
//!   ├─ validate (no retain on failure)
//!   ├─ retain → queue (bounded)
//!   └─ await reply
//!
//! worker: recv → handler.handle_append_entries(&req) → send reply → release
//! ```
//!
//! The actual log and state machine live behind [`ReplicationHandler`].

use crate::config::EndpointConfig;
use crate::endpoint::ReplicationEndpoint;
use crate::error::{RaftError, Result};
use crate::refcount::RefCounted;
use crate::types::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;

/// Log / state-machine layer behind a [`PipelinedEndpoint`].
///
/// Must eventually resolve every call, and must not keep references to a
/// request past the call that received it.
#[async_trait]
pub trait ReplicationHandler: Send + Sync + 'static {
    /// Apply (or reject) one AppendEntries batch.
    async fn handle_append_entries(
        &self,
        request: &AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse>;

    /// Establish a commit-index watermark for a linearizable read.
    async fn handle_read_index(&self, request: ReadIndexRequest) -> Result<ReadIndexResponse>;
}

/// Queued AppendEntries: one retained unit plus the reply channel.
struct PendingAppend {
    request: RefCounted<AppendEntriesRequest>,
    reply_tx: oneshot::Sender<Result<AppendEntriesResponse>>,
}

/// AppendEntries endpoint that processes requests on a worker queue.
///
/// Must be created inside a tokio runtime (spawns the worker task).
pub struct PipelinedEndpoint {
    config: EndpointConfig,
    handler: Arc<dyn ReplicationHandler>,
    queue_tx: Mutex<Option<mpsc::Sender<PendingAppend>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    read_permits: Semaphore,
}

impl PipelinedEndpoint {
    /// Create the endpoint and spawn its worker.
    pub fn new(config: EndpointConfig, handler: Arc<dyn ReplicationHandler>) -> Result<Self> {
        config
            .validate()
            .map_err(|reason| RaftError::ConfigError { reason })?;

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let worker = tokio::spawn(append_worker(handler.clone(), queue_rx));
        let read_permits = Semaphore::new(config.max_pending_read_index);

        Ok(Self {
            config,
            handler,
            queue_tx: Mutex::new(Some(queue_tx)),
            worker: Mutex::new(Some(worker)),
            read_permits,
        })
    }

    /// Stop accepting AppendEntries and wait for the worker to drain.
    ///
    /// Requests already queued are still handled and released.
    pub async fn shutdown(&self) {
        self.queue_tx.lock().take();
        let worker = self.worker.lock().take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = ?e, "AppendEntries worker terminated abnormally");
            }
        }
        tracing::info!("Pipelined endpoint shut down");
    }
}

#[async_trait]
impl ReplicationEndpoint for PipelinedEndpoint {
    async fn append_entries_ref(
        &self,
        request: &RefCounted<AppendEntriesRequest>,
    ) -> Result<AppendEntriesResponse> {
        if let Err(e) = validate_append(request.get(), &self.config) {
            tracing::warn!(
                term = %request.term,
                leader = %request.leader_id,
                error = %e,
                "Rejecting AppendEntries before processing"
            );
            return Err(e);
        }

        let queue_tx = self.queue_tx.lock().clone().ok_or(RaftError::Shutdown)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = PendingAppend {
            request: request.retain(),
            reply_tx,
        };

        // On send failure the pending entry is dropped here, releasing its unit.
        if queue_tx.send(pending).await.is_err() {
            return Err(RaftError::Shutdown);
        }
        drop(queue_tx);

        reply_rx.await.map_err(|_| RaftError::Internal {
            reason: "AppendEntries worker dropped the reply".to_string(),
        })?
    }

    async fn read_index(&self, request: ReadIndexRequest) -> Result<ReadIndexResponse> {
        let _permit = self.read_permits.try_acquire().map_err(|_| {
            tracing::warn!(
                read_id = request.read_id,
                limit = self.config.max_pending_read_index,
                "Too many pending read-index requests"
            );
            RaftError::Overloaded {
                limit: self.config.max_pending_read_index,
            }
        })?;

        self.handler.handle_read_index(request).await
    }
}

/// Worker loop: handle queued requests in order, reply, then release.
async fn append_worker(
    handler: Arc<dyn ReplicationHandler>,
    mut queue_rx: mpsc::Receiver<PendingAppend>,
) {
    while let Some(PendingAppend { request, reply_tx }) = queue_rx.recv().await {
        let result = handler.handle_append_entries(request.get()).await;
        if let Err(e) = &result {
            tracing::warn!(
                term = %request.term,
                prev_log_index = %request.prev_log_index,
                error = %e,
                "AppendEntries processing failed"
            );
        }

        // Caller may have gone away; the request is released either way.
        let _ = reply_tx.send(result);
        request.release();
    }

    tracing::debug!("AppendEntries queue closed, worker exiting");
}

/// Structural checks that must pass before any replication decision.
///
/// - at most `max_entries_per_append` entries
/// - entry indices contiguous, starting right after `prev_log_index`
pub fn validate_append(request: &AppendEntriesRequest, config: &EndpointConfig) -> Result<()> {
    if request.entries.len() > config.max_entries_per_append {
        return Err(RaftError::invalid(format!(
            "{} entries exceeds limit of {}",
            request.entries.len(),
            config.max_entries_per_append
        )));
    }

    let mut expected = request.prev_log_index.checked_next();
    for entry in &request.entries {
        match expected {
            Some(index) if entry.index == index => expected = index.checked_next(),
            Some(index) => {
                return Err(RaftError::invalid(format!(
                    "entry index {} does not follow {}",
                    entry.index,
                    index.prev().unwrap_or(LogIndex::ZERO)
                )));
            }
            None => return Err(RaftError::invalid("log index overflow")),
        }
    }

    Ok(())
}
