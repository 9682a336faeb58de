//! Processor configuration.

use serde::{Deserialize, Serialize};

/// Processor loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Sleep after an empty pop, in milliseconds
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    /// Sleep after a queue error, in milliseconds
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Number of per-sensor lock shards
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,
}

fn default_idle_backoff_ms() -> u64 {
    100
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_lock_shards() -> usize {
    64
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: default_idle_backoff_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            lock_shards: default_lock_shards(),
        }
    }
}
