//! RPC handler loop for processing incoming AppendEntries / ReadIndex.
//!
//! Bridges the transport (which delivers `RpcMessage`s) to a
//! [`ReplicationEndpoint`].
//!
//! # Architecture
//!
//! ```text
//! Transport receives RPC → RpcMessage enum → rpc_handler_loop
//!     ↓ (one task per message, no ordering between them)
//! AppendEntries → endpoint.append_entries_ref(&request) → release transport unit
//! ReadIndex     → endpoint.read_index(request)
//!     ↓
//! Send Result back via oneshot channel
//! ```

use crate::endpoint::ReplicationEndpoint;
use crate::transport::{RpcMessage, RpcReceiver};
use std::sync::Arc;
use tokio::sync::broadcast;

/// RPC handler loop.
///
/// Continuously receives RPC messages from the transport and dispatches each
/// one on its own task, so a slow AppendEntries never blocks a ReadIndex.
///
/// # Shutdown
/// The loop exits when either:
/// - Shutdown signal is received
/// - RPC receiver channel is closed
///
/// Messages already dispatched run to completion.
pub async fn rpc_handler_loop(
    endpoint: Arc<dyn ReplicationEndpoint>,
    mut rpc_rx: RpcReceiver,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            msg_opt = rpc_rx.recv() => {
                match msg_opt {
                    Some(msg) => {
                        tokio::spawn(handle_rpc_message(endpoint.clone(), msg));
                    }
                    None => {
                        tracing::debug!("RPC channel closed, exiting handler loop");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("RPC handler loop shutting down");
                break;
            }
        }
    }
}

/// Dispatch a single RPC message to the endpoint and send back the result.
///
/// For AppendEntries the transport's unit is released as soon as the
/// endpoint call returns, whatever its outcome.
pub async fn handle_rpc_message(endpoint: Arc<dyn ReplicationEndpoint>, msg: RpcMessage) {
    match msg {
        RpcMessage::AppendEntries {
            request,
            response_tx,
        } => {
            let result = endpoint.append_entries_ref(&request).await;
            request.release();

            if let Err(e) = &result {
                tracing::error!(error = %e, "Failed to handle AppendEntries");
            }
            let _ = response_tx.send(result);
        }

        RpcMessage::ReadIndex {
            request,
            response_tx,
        } => {
            let read_id = request.read_id;
            let result = endpoint.read_index(request).await;

            if let Err(e) = &result {
                tracing::error!(read_id, error = %e, "Failed to handle ReadIndex");
            }
            let _ = response_tx.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RaftError, Result};
    use crate::refcount::RefCounted;
    use crate::types::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts heartbeats through the simple form; rejects reads.
    struct Follower;

    #[async_trait]
    impl ReplicationEndpoint for Follower {
        async fn append_entries(
            &self,
            request: &AppendEntriesRequest,
        ) -> Result<AppendEntriesResponse> {
            Ok(AppendEntriesResponse::accepted(
                request.term,
                request.last_entry_index(),
            ))
        }

        async fn read_index(&self, _request: ReadIndexRequest) -> Result<ReadIndexResponse> {
            Err(RaftError::NotLeader {
                leader: Some(NodeId::new("n2")),
            })
        }
    }

    fn heartbeat() -> AppendEntriesRequest {
        AppendEntriesRequest {
            term: Term(1),
            leader_id: NodeId::new("n2"),
            prev_log_index: LogIndex::ZERO,
            prev_log_term: Term::ZERO,
            entries: vec![],
            leader_commit: LogIndex::ZERO,
        }
    }

    #[tokio::test]
    async fn test_rpc_handler_append_entries_releases_unit() {
        let (rpc_tx, rpc_rx) = tokio::sync::mpsc::channel(10);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handler_task = tokio::spawn(rpc_handler_loop(Arc::new(Follower), rpc_rx, shutdown_rx));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let request = RefCounted::with_release(heartbeat(), move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let (response_tx, response_rx) = tokio::sync::oneshot::channel();
        rpc_tx
            .send(RpcMessage::AppendEntries {
                request,
                response_tx,
            })
            .await
            .unwrap();

        let response = response_rx.await.unwrap().unwrap();
        assert_eq!(response.term, Term(1));
        assert!(response.success);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let _ = shutdown_tx.send(());
        handler_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_handler_read_index_error() {
        let (rpc_tx, rpc_rx) = tokio::sync::mpsc::channel(10);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handler_task = tokio::spawn(rpc_handler_loop(Arc::new(Follower), rpc_rx, shutdown_rx));

        let (response_tx, response_rx) = tokio::sync::oneshot::channel();
        rpc_tx
            .send(RpcMessage::ReadIndex {
                request: ReadIndexRequest {
                    term: Term(1),
                    read_id: 7,
                },
                response_tx,
            })
            .await
            .unwrap();

        let response = response_rx.await.unwrap();
        assert!(matches!(response, Err(RaftError::NotLeader { .. })));

        let _ = shutdown_tx.send(());
        handler_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_handler_channel_closed() {
        let (rpc_tx, rpc_rx) = tokio::sync::mpsc::channel(10);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handler_task = tokio::spawn(rpc_handler_loop(Arc::new(Follower), rpc_rx, shutdown_rx));

        drop(rpc_tx);
        handler_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_handler_shutdown() {
        let (_rpc_tx, rpc_rx) = tokio::sync::mpsc::channel(10);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handler_task = tokio::spawn(rpc_handler_loop(Arc::new(Follower), rpc_rx, shutdown_rx));

        let _ = shutdown_tx.send(());
        handler_task.await.unwrap();
    }
}
