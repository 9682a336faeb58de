//! Live observation fan-out.
//!
//! Viewer sessions subscribe a group name to the sensors they are watching.
//! Each freshly persisted observation is pushed to every group subscribed to
//! its sensor; delivery is best effort and a failing group never blocks the
//! others or the pipeline.

pub mod memory;
pub mod redis_transport;

pub use memory::MemoryTransport;
pub use redis_transport::RedisTransport;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;

use sensor_core::{Result, SensorObservation};
use telemetry::metrics;

/// Delivery channel for group frames.
#[async_trait]
pub trait GroupTransport: Send + Sync {
    /// Delivers one JSON frame to a group.
    async fn send(&self, group: &str, payload: &str) -> Result<()>;

    /// Releases any transport-side state held for a group and reports
    /// whether the group is now empty. Transports with no per-group state
    /// always report empty.
    async fn release(&self, _group: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Subscription registry plus fan-out loop.
///
/// A group name may be shared by sibling connections, so each (sensor,
/// group) entry carries a join count. A group is forgotten only when its
/// last local join leaves and the transport confirms nothing else holds it.
pub struct LiveFanout {
    transport: Arc<dyn GroupTransport>,
    groups: RwLock<HashMap<String, HashMap<String, usize>>>,
}

impl LiveFanout {
    pub fn new(transport: Arc<dyn GroupTransport>) -> Self {
        Self {
            transport,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes a group to a sensor's observations. Repeat subscriptions
    /// from sibling connections stack.
    pub fn subscribe(&self, sensor_id: &str, group: &str) {
        let mut groups = self.groups.write();
        let count = groups
            .entry(sensor_id.to_string())
            .or_default()
            .entry(group.to_string())
            .or_insert(0);
        if *count == 0 {
            metrics().live_subscriptions.inc();
        }
        *count += 1;
    }

    /// Drops one join of a group's subscription to a sensor. The transport
    /// is released first; the group is removed locally only when no sibling
    /// join remains and the transport confirms the group is empty. On
    /// transport failure nothing changes, so the caller can retry.
    pub async fn unsubscribe(&self, sensor_id: &str, group: &str) -> Result<()> {
        let transport_empty = self.transport.release(group).await?;
        let mut groups = self.groups.write();
        if let Some(members) = groups.get_mut(sensor_id) {
            if let Some(count) = members.get_mut(group) {
                *count = count.saturating_sub(1);
                if *count == 0 && transport_empty {
                    members.remove(group);
                    metrics().live_subscriptions.dec();
                }
            }
            if members.is_empty() {
                groups.remove(sensor_id);
            }
        }
        Ok(())
    }

    /// Groups currently subscribed to a sensor.
    pub fn subscribers(&self, sensor_id: &str) -> Vec<String> {
        self.groups
            .read()
            .get(sensor_id)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Pushes an observation to every group subscribed to its sensor. A
    /// group that fails to deliver is logged and skipped.
    pub async fn publish(&self, observation: &SensorObservation) -> Result<()> {
        let targets = self.subscribers(&observation.sensor_id);
        if targets.is_empty() {
            return Ok(());
        }

        let frame = serde_json::to_string(&serde_json::json!({ "message": observation }))?;
        for group in targets {
            match self.transport.send(&group, &frame).await {
                Ok(()) => metrics().fanout_published.inc(),
                Err(e) => {
                    metrics().fanout_errors.inc();
                    warn!(
                        group = %group,
                        sensor_id = %observation.sensor_id,
                        error = %e,
                        "Fan-out delivery failed, skipping group"
                    );
                }
            }
        }
        Ok(())
    }
}
