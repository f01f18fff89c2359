//! nori-raft-rpc: asynchronous AppendEntries / ReadIndex endpoint contract.
//!
//! The boundary between a Raft transport and the replication layer:
//! - `RefCounted` request handles with exactly-once release
//! - `ReplicationEndpoint` with a simple and a reference-counted
//!   AppendEntries form, plus a mandatory ReadIndex
//! - `PipelinedEndpoint`, which retains requests past the call and processes
//!   them on a worker queue
//! - In-memory transport and the RPC handler loop that feeds an endpoint
//!
//! Log storage, elections, membership and snapshots live elsewhere; they are
//! reached through [`pipeline::ReplicationHandler`].

pub mod config;
pub mod endpoint;
pub mod error;
pub mod pipeline;
pub mod refcount;
pub mod rpc_handler;
pub mod transport;
pub mod types;

pub use config::EndpointConfig;
pub use endpoint::ReplicationEndpoint;
pub use error::{RaftError, Result};
pub use pipeline::{PipelinedEndpoint, ReplicationHandler};
pub use refcount::RefCounted;
pub use types::*;
