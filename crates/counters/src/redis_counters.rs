//! Redis counter store.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::info;

use sensor_core::{Error, Result};

use crate::CounterStore;

/// HINCRBY plus an EXPIREAT that only fires when the hash has no TTL yet.
/// Running both inside one script closes the increment/expiry race between
/// concurrent bumps at a window's first write.
const BUMP_SCRIPT: &str = r"
local value = redis.call('HINCRBY', KEYS[1], ARGV[1], ARGV[2])
if redis.call('TTL', KEYS[1]) < 0 then
  redis.call('EXPIREAT', KEYS[1], ARGV[3])
end
return value
";

/// Counter store backed by Redis hashes.
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    bump: Script,
}

impl RedisCounterStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            bump: Script::new(BUMP_SCRIPT),
        }
    }

    /// Opens a dedicated connection to the given Redis URL.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::counter(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::counter(format!("redis connect failed: {e}")))?;
        info!("Counter store connected to Redis");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn bump_windowed(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        expire_at: i64,
    ) -> Result<i64> {
        let mut conn = self.conn.clone();
        self.bump
            .key(key)
            .arg(field)
            .arg(delta)
            .arg(expire_at)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::counter(format!("counter bump failed for {key}: {e}")))
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta)
            .await
            .map_err(|e| Error::counter(format!("tally incr failed for {key}: {e}")))
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn
            .hget(key, field)
            .await
            .map_err(|e| Error::counter(format!("counter read failed for {key}: {e}")))?;
        Ok(value.unwrap_or(0))
    }

    async fn get(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn
            .get(key)
            .await
            .map_err(|e| Error::counter(format!("tally read failed for {key}: {e}")))?;
        Ok(value.unwrap_or(0))
    }
}
