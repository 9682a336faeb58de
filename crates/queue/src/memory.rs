//! In-memory work queue for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use sensor_core::{RawTelemetryMessage, Result};

use crate::WorkQueue;

/// Process-local FIFO queue with the same ordering semantics as the Redis
/// backend.
#[derive(Default)]
pub struct MemoryWorkQueue {
    items: Mutex<VecDeque<RawTelemetryMessage>>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn push(&self, msg: &RawTelemetryMessage) -> Result<()> {
        self.items.lock().push_back(msg.clone());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<RawTelemetryMessage>> {
        Ok(self.items.lock().pop_front())
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.items.lock().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::MsgKind;

    #[tokio::test]
    async fn test_memory_queue_is_fifo() {
        let queue = MemoryWorkQueue::new();
        for i in 0..3 {
            let msg =
                RawTelemetryMessage::new(MsgKind::Telemetry, "gw1", format!("s{i}"), "{}");
            queue.push(&msg).await.unwrap();
        }
        assert_eq!(queue.len().await.unwrap(), 3);
        assert_eq!(queue.pop().await.unwrap().unwrap().sensor_id, "s0");
        assert_eq!(queue.pop().await.unwrap().unwrap().sensor_id, "s1");
        assert_eq!(queue.pop().await.unwrap().unwrap().sensor_id, "s2");
        assert!(queue.pop().await.unwrap().is_none());
    }
}
