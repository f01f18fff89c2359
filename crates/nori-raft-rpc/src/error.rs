//! RPC endpoint error types.

use thiserror::Error;

use crate::types::NodeId;

/// Errors surfaced by replication and read-index endpoints.
///
/// A returned error means no replication or read-index decision was made.
/// A rejected AppendEntries is not an error: it is an `Ok` reply with
/// `success == false`.
#[derive(Error, Debug)]
pub enum RaftError {
    /// The endpoint does not implement this form of the operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: &'static str },

    /// Request failed validation before processing started.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Not the leader (cannot establish a read index).
    #[error("Not leader (current leader: {leader:?})")]
    NotLeader { leader: Option<NodeId> },

    /// Too many read-index calls in flight.
    #[error("Overloaded (limit {limit} pending read-index requests)")]
    Overloaded { limit: usize },

    /// Endpoint was shut down before the request could be queued.
    #[error("Endpoint shut down")]
    Shutdown,

    /// Configuration error (invalid endpoint config).
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// I/O error (transport, channel closed, etc.).
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Internal error (bug).
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl RaftError {
    /// Shorthand for `RaftError::InvalidRequest`.
    pub fn invalid(reason: impl Into<String>) -> Self {
        RaftError::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// Endpoint result type.
pub type Result<T> = std::result::Result<T, RaftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RaftError::Unsupported {
            operation: "append_entries",
        };
        assert_eq!(err.to_string(), "Unsupported operation: append_entries");

        let err = RaftError::NotLeader {
            leader: Some(NodeId::new("n2")),
        };
        assert!(err.to_string().contains("n2"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: RaftError = io.into();
        assert!(matches!(err, RaftError::Io { .. }));
    }
}
