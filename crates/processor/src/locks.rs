//! Sharded per-key async locks.
//!
//! Store writes for one sensor must not interleave, but distinct sensors
//! should proceed in parallel. A fixed array of async mutexes indexed by key
//! hash gives both without unbounded lock growth; two sensors sharing a
//! shard merely serialize against each other.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

pub struct KeyLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyLocks {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Acquires the shard lock for a key; held until the guard drops.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        self.shards[index].lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_contends_until_released() {
        let locks = KeyLocks::new(8);
        let guard = locks.lock("sensor1").await;
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.lock("sensor1"),
        )
        .await;
        assert!(second.is_err());
        drop(guard);
        let _reacquired = locks.lock("sensor1").await;
    }

    #[tokio::test]
    async fn test_zero_shards_clamped() {
        let locks = KeyLocks::new(0);
        let _guard = locks.lock("any").await;
    }
}
