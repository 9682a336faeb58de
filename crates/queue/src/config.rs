//! Work queue configuration.

use serde::{Deserialize, Serialize};

/// Work queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis list key backing the queue
    #[serde(default = "default_key")]
    pub key: String,
    /// Bound on a single queue operation in milliseconds
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

fn default_key() -> String {
    "telemetry_work_queue".to_string()
}

fn default_op_timeout_ms() -> u64 {
    5000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}
