//! Redis pub/sub transport.
//!
//! Each group maps to a Redis channel; the session layer holding the actual
//! client connections subscribes to its own group channel.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use sensor_core::{Error, Result};

use crate::GroupTransport;

const CHANNEL_PREFIX: &str = "fanout:";

/// Publishes group frames on Redis channels.
pub struct RedisTransport {
    conn: MultiplexedConnection,
}

impl RedisTransport {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Opens a dedicated connection to the given Redis URL.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::fanout("*", format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::fanout("*", format!("redis connect failed: {e}")))?;
        info!("Fan-out transport connected to Redis");
        Ok(Self::new(conn))
    }

    /// Channel a group's frames are published on.
    pub fn channel(group: &str) -> String {
        format!("{CHANNEL_PREFIX}{group}")
    }
}

#[async_trait]
impl GroupTransport for RedisTransport {
    async fn send(&self, group: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(Self::channel(group), payload)
            .await
            .map_err(|e| Error::fanout(group, format!("publish failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_is_prefixed() {
        assert_eq!(RedisTransport::channel("viewer-a"), "fanout:viewer-a");
    }
}
