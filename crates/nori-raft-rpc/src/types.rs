//! Core types: Term, Index, log entries, AppendEntries and ReadIndex payloads.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raft term number (monotonically increasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term(pub u64);

impl Term {
    pub const ZERO: Term = Term(0);
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Log index (1-indexed, 0 is sentinel for "no entry").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogIndex(pub u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);

    pub fn next(self) -> LogIndex {
        LogIndex(self.0 + 1)
    }

    /// The following index, or `None` past `u64::MAX`.
    pub fn checked_next(self) -> Option<LogIndex> {
        self.0.checked_add(1).map(LogIndex)
    }

    pub fn prev(self) -> Option<LogIndex> {
        if self.0 > 0 {
            Some(LogIndex(self.0 - 1))
        } else {
            None
        }
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Node identifier (unique across cluster).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Log entry (command + metadata).
///
/// `command` is opaque to this crate; it is interpreted by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: Term,
    pub index: LogIndex,
    pub command: Bytes,
}

impl LogEntry {
    pub fn new(term: Term, index: LogIndex, command: Bytes) -> Self {
        Self {
            term,
            index,
            command,
        }
    }
}

/// AppendEntries RPC request.
///
/// One batch of log entries from leader to follower.
/// Empty entries list = heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    /// Leader's term
    pub term: Term,

    /// Leader's ID (so follower can redirect clients)
    pub leader_id: NodeId,

    /// Index of log entry immediately preceding new ones
    pub prev_log_index: LogIndex,

    /// Term of prev_log_index entry
    pub prev_log_term: Term,

    /// Log entries to store (empty for heartbeat)
    pub entries: Vec<LogEntry>,

    /// Leader's commit index
    pub leader_commit: LogIndex,
}

impl AppendEntriesRequest {
    pub fn is_heartbeat(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the last entry carried, or `prev_log_index` for a heartbeat.
    pub fn last_entry_index(&self) -> LogIndex {
        self.entries
            .last()
            .map(|e| e.index)
            .unwrap_or(self.prev_log_index)
    }
}

/// AppendEntries RPC response.
///
/// `success == true`: the follower accepted the batch and its log now ends at
/// `last_log_index`.
/// `success == false`: rejection; `conflict_index`/`conflict_term` tell the
/// leader where to retry from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    /// Current term, for leader to update itself
    pub term: Term,

    /// True if follower contained entry matching prev_log_index/term
    pub success: bool,

    /// Hint for leader to backtrack faster on conflict
    pub conflict_index: Option<LogIndex>,

    /// Term of the conflicting entry, if the follower has one
    pub conflict_term: Option<Term>,

    /// Follower's last log index (for match_index tracking)
    pub last_log_index: LogIndex,
}

impl AppendEntriesResponse {
    pub fn accepted(term: Term, last_log_index: LogIndex) -> Self {
        Self {
            term,
            success: true,
            conflict_index: None,
            conflict_term: None,
            last_log_index,
        }
    }

    pub fn rejected(
        term: Term,
        last_log_index: LogIndex,
        conflict_index: Option<LogIndex>,
        conflict_term: Option<Term>,
    ) -> Self {
        Self {
            term,
            success: false,
            conflict_index,
            conflict_term,
            last_log_index,
        }
    }
}

/// ReadIndex RPC request (linearizable reads).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadIndexRequest {
    /// Requester's term
    pub term: Term,

    /// Unique read ID (for tracking)
    pub read_id: u64,
}

/// ReadIndex RPC response.
///
/// The state machine must have applied `read_index` before a read served
/// after this reply is linearizable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadIndexResponse {
    /// Current term of the responding server
    pub term: Term,

    /// Read ID (matches request)
    pub read_id: u64,

    /// Commit-index watermark
    pub read_index: LogIndex,
}
