//! Read-only provisioning lookups.
//!
//! The external CRUD layer owns sensor provisioning (sensor → tenant
//! linkage) and the enabled-gateway set; this crate only reads them. The
//! pipeline resolves provisioning cache-first with a read-through to the
//! source on miss. Misses are never cached: an unprovisioned sensor that
//! gets provisioned later must start resolving immediately.

pub mod config;
pub mod memory;
pub mod redis_source;

pub use config::ProvisioningConfig;
pub use memory::MemoryProvisioningSource;
pub use redis_source::RedisProvisioningSource;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::warn;

use sensor_core::{Result, SensorMeta};

/// Source of truth for provisioning data, owned by the external CRUD layer.
#[async_trait]
pub trait ProvisioningSource: Send + Sync {
    /// Resolves a sensor's tenant linkage. `None` means not provisioned.
    async fn sensor_meta(&self, sensor_id: &str) -> Result<Option<SensorMeta>>;

    /// Membership test against the enabled-gateway set.
    async fn gateway_enabled(&self, gateway_id: &str) -> Result<bool>;
}

/// Cache-first provisioning resolver.
pub struct Provisioning {
    source: Arc<dyn ProvisioningSource>,
    cache: Cache<String, SensorMeta>,
}

impl Provisioning {
    pub fn new(source: Arc<dyn ProvisioningSource>, config: &ProvisioningConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();
        Self { source, cache }
    }

    /// Admission predicate: gateway enabled AND sensor provisioned.
    pub async fn can_process(&self, gateway_id: &str, sensor_id: &str) -> Result<bool> {
        if !self.source.gateway_enabled(gateway_id).await? {
            return Ok(false);
        }
        Ok(self.resolve(sensor_id).await?.is_some())
    }

    /// Resolves provisioning cache-first, reading through to the source on
    /// miss and caching only hits.
    pub async fn resolve(&self, sensor_id: &str) -> Result<Option<SensorMeta>> {
        if let Some(meta) = self.cache.get(sensor_id).await {
            return Ok(Some(meta));
        }
        match self.source.sensor_meta(sensor_id).await? {
            Some(meta) => {
                self.cache.insert(sensor_id.to_string(), meta.clone()).await;
                Ok(Some(meta))
            }
            None => {
                warn!(sensor_id = %sensor_id, "provisioning lookup returned nothing");
                Ok(None)
            }
        }
    }

    /// Drops a cached entry, forcing the next resolve back to the source.
    pub async fn invalidate(&self, sensor_id: &str) {
        self.cache.invalidate(sensor_id).await;
    }
}
