//! Internal telemetry for the gridwatch sensor pipeline.
//!
//! Metrics are plain in-process atomics; there is no external metrics
//! system. Dashboards and tests read snapshots directly.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
