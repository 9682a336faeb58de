//! Provisioning cache configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the in-process provisioning cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Maximum cached sensors
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Cache entry lifetime in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_capacity() -> u64 {
    50_000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}
