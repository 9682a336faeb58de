//! Redis-backed provisioning source.
//!
//! The CRUD layer maintains `sensor_info:{sensor_id}` hashes and the
//! `client_ids` set of enabled gateways; this source only reads them.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use sensor_core::{Error, Result, SensorMeta};

use crate::ProvisioningSource;

const SENSOR_INFO_PREFIX: &str = "sensor_info:";
const ENABLED_GATEWAYS_KEY: &str = "client_ids";

/// Provisioning reads against the shared Redis instance.
pub struct RedisProvisioningSource {
    conn: MultiplexedConnection,
}

impl RedisProvisioningSource {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::config(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::internal(format!("redis connect failed: {e}")))?;
        Ok(Self::new(conn))
    }

    fn meta_from_hash(sensor_id: &str, mut hash: HashMap<String, String>) -> Option<SensorMeta> {
        if hash.is_empty() {
            return None;
        }
        let customer_id = hash.remove("customer_id");
        let site_id = hash.remove("site_id");
        let equipment_id = hash.remove("equipment_id");
        let point_id = hash.remove("point_id");
        match (customer_id, site_id, equipment_id, point_id) {
            (Some(customer_id), Some(site_id), Some(equipment_id), Some(point_id)) => {
                Some(SensorMeta {
                    customer_id,
                    site_id,
                    equipment_id,
                    point_id,
                })
            }
            _ => {
                // A partial hash means the CRUD layer is mid-write or the
                // record is corrupt; treat it as unprovisioned.
                warn!(sensor_id = %sensor_id, "incomplete sensor_info hash");
                None
            }
        }
    }
}

#[async_trait]
impl ProvisioningSource for RedisProvisioningSource {
    async fn sensor_meta(&self, sensor_id: &str) -> Result<Option<SensorMeta>> {
        let key = format!("{SENSOR_INFO_PREFIX}{sensor_id}");
        let mut conn = self.conn.clone();
        let hash: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| Error::internal(format!("sensor_info lookup failed: {e}")))?;
        Ok(Self::meta_from_hash(sensor_id, hash))
    }

    async fn gateway_enabled(&self, gateway_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.sismember(ENABLED_GATEWAYS_KEY, gateway_id)
            .await
            .map_err(|e| Error::internal(format!("gateway enablement lookup failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_from_complete_hash() {
        let hash: HashMap<String, String> = [
            ("customer_id", "c1"),
            ("site_id", "s1"),
            ("equipment_id", "e1"),
            ("point_id", "p1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let meta = RedisProvisioningSource::meta_from_hash("sensor1", hash).unwrap();
        assert_eq!(meta.customer_id, "c1");
        assert_eq!(meta.point_id, "p1");
    }

    #[test]
    fn test_meta_from_partial_hash_is_none() {
        let hash: HashMap<String, String> =
            [("customer_id".to_string(), "c1".to_string())].into_iter().collect();
        assert!(RedisProvisioningSource::meta_from_hash("sensor1", hash).is_none());
    }

    #[test]
    fn test_meta_from_empty_hash_is_none() {
        assert!(RedisProvisioningSource::meta_from_hash("sensor1", HashMap::new()).is_none());
    }
}
