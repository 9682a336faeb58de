//! In-memory provisioning source for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use sensor_core::{Result, SensorMeta};

use crate::ProvisioningSource;

/// Process-local provisioning source. Tests provision sensors and enable
/// gateways directly.
#[derive(Default)]
pub struct MemoryProvisioningSource {
    gateways: RwLock<HashSet<String>>,
    sensors: RwLock<HashMap<String, SensorMeta>>,
}

impl MemoryProvisioningSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_gateway(&self, gateway_id: impl Into<String>) {
        self.gateways.write().insert(gateway_id.into());
    }

    pub fn disable_gateway(&self, gateway_id: &str) {
        self.gateways.write().remove(gateway_id);
    }

    pub fn provision_sensor(&self, sensor_id: impl Into<String>, meta: SensorMeta) {
        self.sensors.write().insert(sensor_id.into(), meta);
    }

    pub fn remove_sensor(&self, sensor_id: &str) {
        self.sensors.write().remove(sensor_id);
    }
}

#[async_trait]
impl ProvisioningSource for MemoryProvisioningSource {
    async fn sensor_meta(&self, sensor_id: &str) -> Result<Option<SensorMeta>> {
        Ok(self.sensors.read().get(sensor_id).cloned())
    }

    async fn gateway_enabled(&self, gateway_id: &str) -> Result<bool> {
        Ok(self.gateways.read().contains(gateway_id))
    }
}
