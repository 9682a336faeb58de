//! In-memory counter store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use sensor_core::Result;

use crate::CounterStore;

#[derive(Default)]
struct Hash {
    fields: HashMap<String, i64>,
    expire_at: Option<i64>,
}

/// Mirrors the Redis semantics: hashes expire wholesale at their deadline,
/// the expiry is only armed on the bump that creates it.
#[derive(Default)]
pub struct MemoryCounterStore {
    hashes: Mutex<HashMap<String, Hash>>,
    tallies: Mutex<HashMap<String, i64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expiry deadline armed for a hash, for assertions.
    pub fn expire_at(&self, key: &str) -> Option<i64> {
        self.hashes.lock().get(key).and_then(|h| h.expire_at)
    }

    fn purge_expired(hashes: &mut HashMap<String, Hash>, key: &str) {
        let now = Utc::now().timestamp();
        if hashes
            .get(key)
            .and_then(|h| h.expire_at)
            .is_some_and(|at| at <= now)
        {
            hashes.remove(key);
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn bump_windowed(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        expire_at: i64,
    ) -> Result<i64> {
        let mut hashes = self.hashes.lock();
        Self::purge_expired(&mut hashes, key);
        let hash = hashes.entry(key.to_string()).or_default();
        let value = hash.fields.entry(field.to_string()).or_insert(0);
        *value += delta;
        if hash.expire_at.is_none() {
            hash.expire_at = Some(expire_at);
        }
        Ok(*value)
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut tallies = self.tallies.lock();
        let value = tallies.entry(key.to_string()).or_insert(0);
        *value += delta;
        Ok(*value)
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<i64> {
        let mut hashes = self.hashes.lock();
        Self::purge_expired(&mut hashes, key);
        Ok(hashes
            .get(key)
            .and_then(|h| h.fields.get(field))
            .copied()
            .unwrap_or(0))
    }

    async fn get(&self, key: &str) -> Result<i64> {
        Ok(self.tallies.lock().get(key).copied().unwrap_or(0))
    }
}
