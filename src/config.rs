use crate::error::EngineError;
use std::time::Duration;

/// Runtime configuration for an [`EntityEngine`](crate::EntityEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of versions a single load may scan while repairing.
    pub repair_window: usize,
    /// Page size used when streaming version history out of the log.
    pub log_buffer_size: usize,
    pub max_load_size: usize,
    /// Maximum encoded payload size accepted by the write pipeline.
    pub max_entity_size: usize,
    pub store_timeout_ms: u64,
    /// Expiry applied to `Active` log markers. `None` keeps them until compaction.
    pub active_log_ttl_secs: Option<u64>,
    pub commit_event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repair_window: 25,
            log_buffer_size: 100,
            max_load_size: 100,
            max_entity_size: 15 * 1024 * 1024,
            store_timeout_ms: 5_000,
            active_log_ttl_secs: None,
            commit_event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn production() -> Self {
        Self {
            store_timeout_ms: 2_000,
            active_log_ttl_secs: Some(24 * 60 * 60),
            ..Self::default()
        }
    }

    /// Small windows and short timeouts so failure paths show up quickly.
    pub fn development() -> Self {
        Self {
            repair_window: 8,
            log_buffer_size: 16,
            max_load_size: 32,
            store_timeout_ms: 500,
            ..Self::default()
        }
    }

    pub fn with_repair_window(mut self, window: usize) -> Self {
        self.repair_window = window;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_entity_size(mut self, bytes: usize) -> Self {
        self.max_entity_size = bytes;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn active_log_ttl(&self) -> Option<Duration> {
        self.active_log_ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |message: &str| EngineError::InvalidConfig {
            message: message.to_string(),
        };
        if self.repair_window == 0 {
            return Err(invalid("repair_window must be greater than 0"));
        }
        if self.log_buffer_size == 0 {
            return Err(invalid("log_buffer_size must be greater than 0"));
        }
        if self.max_load_size == 0 {
            return Err(invalid("max_load_size must be greater than 0"));
        }
        if self.max_entity_size == 0 {
            return Err(invalid("max_entity_size must be greater than 0"));
        }
        if self.store_timeout_ms == 0 {
            return Err(invalid("store_timeout_ms must be greater than 0"));
        }
        if self.active_log_ttl_secs == Some(0) {
            return Err(invalid("active_log_ttl_secs must be positive when set"));
        }
        if self.commit_event_capacity == 0 {
            return Err(invalid("commit_event_capacity must be greater than 0"));
        }
        Ok(())
    }
}
