//! Durable FIFO work queue decoupling ingress from processing.
//!
//! Ingress pushes to the tail; the processor pops from the head one message
//! at a time. The queue offers at-least-once delivery with FIFO ordering
//! per instance; with multiple processor instances there is no cross-message
//! ordering guarantee.

pub mod config;
pub mod memory;
pub mod redis_queue;

pub use config::QueueConfig;
pub use memory::MemoryWorkQueue;
pub use redis_queue::RedisWorkQueue;

use async_trait::async_trait;

use sensor_core::{RawTelemetryMessage, Result};

/// FIFO buffer between ingress and processor.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Appends a message to the queue tail.
    async fn push(&self, msg: &RawTelemetryMessage) -> Result<()>;

    /// Pops one message from the queue head. `None` means the queue is
    /// empty; the caller owns the idle back-off.
    async fn pop(&self) -> Result<Option<RawTelemetryMessage>>;

    /// Current queue depth.
    async fn len(&self) -> Result<u64>;
}
