//! Asynchronous AppendEntries / ReadIndex endpoint.
//!
//! `ReplicationEndpoint` is what a transport calls into once a request has
//! been decoded. AppendEntries comes in two forms:
//!
//! - `append_entries(&request)`: the simple form. Unsupported by default.
//! - `append_entries_ref(&RefCounted<request>)`: the primary form. The
//!   default retains the request, forwards the payload to the simple form and
//!   releases once that call settles, on every exit path.
//!
//! Implementations that process requests on a queue override the primary
//! form, retain the request for as long as they need it, and release it when
//! they are done. The reply may be delivered before that release happens.
//!
//! ```text
//! transport ── RefCounted(count 1) ──▶ append_entries_ref
//!                                         │ retain        (count 2)
//!                                         ▼
//!                                      append_entries(&payload).await
//!                                         │ release       (count 1)
//!                                         ▼
//! transport ◀──────── Result<reply> ──────┘
//! transport: release                      (count 0 → release action)
//! ```

use crate::error::{RaftError, Result};
use crate::refcount::RefCounted;
use crate::types::*;
use async_trait::async_trait;

/// Server-side entry point for AppendEntries and ReadIndex.
///
/// An `Err` from either AppendEntries form means no replication decision was
/// made; a rejected batch is an `Ok` reply with `success == false`.
#[async_trait]
pub trait ReplicationEndpoint: Send + Sync {
    /// Handle AppendEntries given a plain payload.
    ///
    /// Override [`append_entries_ref`](Self::append_entries_ref) instead when
    /// the request must outlive this call. The default fails with
    /// `Unsupported`, so an implementation that overrides neither form
    /// rejects every AppendEntries.
    async fn append_entries(
        &self,
        _request: &AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse> {
        Err(RaftError::Unsupported {
            operation: "append_entries",
        })
    }

    /// Handle a reference-counted AppendEntries request.
    ///
    /// The caller keeps its own unit. Implementations take their own with
    /// `retain()` and give it back with `release()` when processing is done,
    /// which may be after the returned future has completed.
    ///
    /// The default retains, calls [`append_entries`](Self::append_entries)
    /// and releases once that settles. Errors, including ones raised before
    /// the inner call yields, and panics release the retained unit before
    /// they reach the caller.
    async fn append_entries_ref(
        &self,
        request: &RefCounted<AppendEntriesRequest>,
    ) -> Result<AppendEntriesResponse> {
        let retained = request.retain();
        let result = self.append_entries(retained.get()).await;
        retained.release();
        result
    }

    /// Handle AppendEntries for a payload nobody else holds.
    ///
    /// Wraps the payload with a count of one, runs
    /// [`append_entries_ref`](Self::append_entries_ref) and releases the
    /// wrapper's unit afterwards.
    async fn submit_append_entries(
        &self,
        request: AppendEntriesRequest,
    ) -> Result<AppendEntriesResponse> {
        let request = RefCounted::new(request);
        let result = self.append_entries_ref(&request).await;
        request.release();
        result
    }

    /// Obtain a linearizable read point.
    ///
    /// Completes with the commit-index watermark that must be applied before
    /// a read is linearizable with respect to every write committed when the
    /// request was issued. Fails when no such watermark can be established,
    /// e.g. leadership cannot be confirmed.
    async fn read_index(&self, request: ReadIndexRequest) -> Result<ReadIndexResponse>;
}
