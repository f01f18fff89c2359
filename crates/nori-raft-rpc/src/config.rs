//! Endpoint configuration (queue depth, batch limits, read-index limits).

use tokio::sync::Semaphore;

/// Configuration for [`PipelinedEndpoint`](crate::pipeline::PipelinedEndpoint).
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Capacity of the AppendEntries processing queue.
    ///
    /// Callers wait for a free slot when the queue is full; every queued
    /// request holds one retained unit until the worker releases it.
    ///
    /// Default: 1024
    pub queue_capacity: usize,

    /// Maximum number of entries per AppendEntries RPC.
    ///
    /// Larger batches are rejected as invalid before any processing starts.
    ///
    /// Default: 1000 entries
    pub max_entries_per_append: usize,

    /// Maximum concurrent read-index requests.
    ///
    /// Read-index requires a quorum round, so it can be slow under load.
    /// Requests beyond the limit fail fast with `Overloaded`.
    ///
    /// Default: 1000
    pub max_pending_read_index: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_entries_per_append: 1000,
            max_pending_read_index: 1000,
        }
    }
}

impl EndpointConfig {
    /// Validate configuration (ensure invariants hold).
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be > 0".to_string());
        }

        if self.queue_capacity > Semaphore::MAX_PERMITS {
            return Err(format!(
                "queue_capacity must be <= {}",
                Semaphore::MAX_PERMITS
            ));
        }

        if self.max_entries_per_append == 0 {
            return Err("max_entries_per_append must be > 0".to_string());
        }

        if self.max_pending_read_index == 0 {
            return Err("max_pending_read_index must be > 0".to_string());
        }

        if self.max_pending_read_index > Semaphore::MAX_PERMITS {
            return Err(format!(
                "max_pending_read_index must be <= {}",
                Semaphore::MAX_PERMITS
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EndpointConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_queue_capacity_invalid() {
        let config = EndpointConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limits_invalid() {
        let mut config = EndpointConfig::default();
        config.max_entries_per_append = 0;
        assert!(config.validate().is_err());

        let mut config = EndpointConfig::default();
        config.max_pending_read_index = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limits_above_semaphore_capacity_invalid() {
        let mut config = EndpointConfig::default();
        config.max_pending_read_index = usize::MAX;
        assert!(config.validate().is_err());

        config.max_pending_read_index = Semaphore::MAX_PERMITS;
        assert!(config.validate().is_ok());

        let config = EndpointConfig {
            queue_capacity: Semaphore::MAX_PERMITS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
