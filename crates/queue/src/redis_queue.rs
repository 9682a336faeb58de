//! Redis-list work queue backend.
//!
//! LPUSH at the tail, RPOP at the head. Redelivery on crash comes from the
//! queue's durability: an item popped but not finished is the only loss
//! window, matching the at-least-once posture of the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use sensor_core::{Error, RawTelemetryMessage, Result};
use telemetry::metrics;

use crate::{QueueConfig, WorkQueue};

/// Work queue backed by a Redis list.
pub struct RedisWorkQueue {
    conn: MultiplexedConnection,
    config: QueueConfig,
}

impl RedisWorkQueue {
    pub fn new(conn: MultiplexedConnection, config: QueueConfig) -> Self {
        Self { conn, config }
    }

    pub async fn connect(redis_url: &str, config: QueueConfig) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::config(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::internal(format!("redis connect failed: {e}")))?;
        Ok(Self::new(conn, config))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.config.op_timeout_ms)
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl std::future::Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.op_timeout(), fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(Error::queue(format!("{what} failed: {e}"))),
            Err(_) => Err(Error::queue(format!(
                "{what} timed out after {}ms",
                self.config.op_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn push(&self, msg: &RawTelemetryMessage) -> Result<()> {
        let payload = serde_json::to_string(msg)?;
        let mut conn = self.conn.clone();
        let depth: u64 = self
            .bounded("queue push", conn.lpush(&self.config.key, payload))
            .await?;
        metrics().queue_depth.set(depth);
        Ok(())
    }

    async fn pop(&self) -> Result<Option<RawTelemetryMessage>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = self
            .bounded("queue pop", conn.rpop(&self.config.key, None))
            .await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(msg) => Ok(Some(msg)),
            Err(e) => {
                // A corrupt entry must not wedge the consumer loop; drop it
                // and move on.
                warn!(error = %e, "dropping undecodable queue entry");
                Ok(None)
            }
        }
    }

    async fn len(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let depth: u64 = self
            .bounded("queue len", conn.llen(&self.config.key))
            .await?;
        metrics().queue_depth.set(depth);
        Ok(depth)
    }
}
