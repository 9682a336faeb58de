//! In-process metrics collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }
}

/// Collected metrics for the sensor pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingress metrics
    pub messages_received: Counter,
    pub messages_admitted: Counter,
    pub messages_rejected: Counter,
    pub malformed_topics: Counter,

    // Processor metrics
    pub messages_processed: Counter,
    pub decode_errors: Counter,
    pub unsupported_sensor_types: Counter,
    pub missing_provisioning: Counter,
    pub observations_written: Counter,
    pub alarms_written: Counter,
    pub store_write_errors: Counter,

    // Counter cache metrics
    pub abnormal_bumps: Counter,
    pub counter_errors: Counter,

    // Fan-out metrics
    pub fanout_published: Counter,
    pub fanout_errors: Counter,

    // Latency histograms
    pub process_latency_ms: Histogram,
    pub store_latency_ms: Histogram,

    // Gauges
    pub queue_depth: Gauge,
    pub live_subscriptions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_received: self.messages_received.get(),
            messages_admitted: self.messages_admitted.get(),
            messages_rejected: self.messages_rejected.get(),
            messages_processed: self.messages_processed.get(),
            decode_errors: self.decode_errors.get(),
            observations_written: self.observations_written.get(),
            alarms_written: self.alarms_written.get(),
            store_write_errors: self.store_write_errors.get(),
            abnormal_bumps: self.abnormal_bumps.get(),
            fanout_published: self.fanout_published.get(),
            fanout_errors: self.fanout_errors.get(),
            process_latency_mean_ms: self.process_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
            live_subscriptions: self.live_subscriptions.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_received: u64,
    pub messages_admitted: u64,
    pub messages_rejected: u64,
    pub messages_processed: u64,
    pub decode_errors: u64,
    pub observations_written: u64,
    pub alarms_written: u64,
    pub store_write_errors: u64,
    pub abnormal_bumps: u64,
    pub fanout_published: u64,
    pub fanout_errors: u64,
    pub process_latency_mean_ms: f64,
    pub queue_depth: u64,
    pub live_subscriptions: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
