//! Transport abstraction for AppendEntries / ReadIndex delivery.
//!
//! Defines the `RaftTransport` trait (the sending side) and the `RpcMessage`
//! envelope handed to [`rpc_handler_loop`](crate::rpc_handler::rpc_handler_loop)
//! on the receiving side.
//!
//! Every AppendEntries delivered through an `RpcMessage` arrives wrapped in a
//! [`RefCounted`] with a count of one, and is delivered exactly once. The
//! receiving side owns that unit and releases it once the endpoint call
//! returns. ReadIndex requests are plain values.

use crate::error::{RaftError, Result};
use crate::refcount::RefCounted;
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Transport abstraction for Raft RPC communication.
///
/// Implementations handle connection management, serialization and network
/// failures. Failures to deliver a request or receive a reply surface as
/// `Io` errors; they never turn into a rejected reply.
#[async_trait]
pub trait RaftTransport: Send + Sync {
    /// Send AppendEntries RPC to a peer.
    ///
    /// Returns the follower's reply (accepted, or rejected with conflict
    /// info), or the error the follower's endpoint produced.
    async fn append_entries(
        &self,
        target: &NodeId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse>;

    /// Send ReadIndex RPC to a peer.
    async fn read_index(
        &self,
        target: &NodeId,
        request: ReadIndexRequest,
    ) -> Result<ReadIndexResponse>;
}

/// RPC message envelope (tagged union of all RPC types).
///
/// Responses carry `Result` so endpoint failures reach the sender instead of
/// showing up as a dropped channel.
#[derive(Debug)]
pub enum RpcMessage {
    AppendEntries {
        request: RefCounted<AppendEntriesRequest>,
        response_tx: tokio::sync::oneshot::Sender<Result<AppendEntriesResponse>>,
    },
    ReadIndex {
        request: ReadIndexRequest,
        response_tx: tokio::sync::oneshot::Sender<Result<ReadIndexResponse>>,
    },
}

pub type RpcSender = tokio::sync::mpsc::Sender<RpcMessage>;
pub type RpcReceiver = tokio::sync::mpsc::Receiver<RpcMessage>;

/// In-memory transport (local channels, no network).
///
/// Used for tests and for wiring multiple endpoints in one process.
///
/// # Example
///
/// ```ignore
/// let (tx, rx) = tokio::sync::mpsc::channel(100);
/// tokio::spawn(rpc_handler_loop(endpoint, rx, shutdown_rx));
///
/// let transport = InMemoryTransport::new(NodeId::new("n1"), HashMap::new());
/// transport.add_peer(NodeId::new("n2"), tx);
/// let reply = transport.append_entries(&NodeId::new("n2"), request).await?;
/// ```
pub struct InMemoryTransport {
    /// This node's ID
    local_id: NodeId,

    /// Channels to other nodes (NodeId → sender)
    peers: Arc<parking_lot::RwLock<HashMap<NodeId, RpcSender>>>,
}

impl InMemoryTransport {
    /// Create a new in-memory transport.
    ///
    /// `local_id`: This node's ID
    /// `peers`: Map of peer IDs to their RPC message senders
    pub fn new(local_id: NodeId, peers: HashMap<NodeId, RpcSender>) -> Self {
        Self {
            local_id,
            peers: Arc::new(parking_lot::RwLock::new(peers)),
        }
    }

    /// Add a peer to the transport.
    pub fn add_peer(&self, peer_id: NodeId, sender: RpcSender) {
        self.peers.write().insert(peer_id, sender);
    }

    /// Remove a peer from the transport.
    pub fn remove_peer(&self, peer_id: &NodeId) {
        self.peers.write().remove(peer_id);
    }

    fn get_peer(&self, peer_id: &NodeId) -> Result<RpcSender> {
        self.peers.read().get(peer_id).cloned().ok_or_else(|| RaftError::Io {
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("peer not found: {}", peer_id),
            ),
        })
    }

    /// Deliver one message and wait for the peer's reply.
    async fn call<R>(
        &self,
        target: &NodeId,
        make: impl FnOnce(tokio::sync::oneshot::Sender<Result<R>>) -> RpcMessage,
    ) -> Result<R> {
        let peer = self.get_peer(target)?;

        let (response_tx, response_rx) = tokio::sync::oneshot::channel();
        peer.send(make(response_tx)).await.map_err(|e| broken_pipe(e.to_string()))?;

        response_rx.await.map_err(|e| broken_pipe(e.to_string()))?
    }
}

fn broken_pipe(reason: String) -> RaftError {
    RaftError::Io {
        source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, reason),
    }
}

#[async_trait]
impl RaftTransport for InMemoryTransport {
    async fn append_entries(
        &self,
        target: &NodeId,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse> {
        tracing::trace!(
            from = %self.local_id,
            to = %target,
            entries = request.entries.len(),
            "Sending AppendEntries"
        );
        let request = RefCounted::new(request);
        self.call(target, |response_tx| RpcMessage::AppendEntries {
            request,
            response_tx,
        })
        .await
    }

    async fn read_index(
        &self,
        target: &NodeId,
        request: ReadIndexRequest,
    ) -> Result<ReadIndexResponse> {
        self.call(target, |response_tx| RpcMessage::ReadIndex {
            request,
            response_tx,
        })
        .await
    }
}
