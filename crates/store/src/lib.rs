//! Versioned observation and alarm-record stores.
//!
//! Each sensor type has its own observation partition; alarm records share
//! one partition keyed by (sensor_id, alarm_kind). Both follow the same
//! "latest" maintenance pattern: insert the new record with
//! `is_latest = true` FIRST, then demote every other latest record for the
//! same key. Readers therefore never observe zero latest records; a
//! transient two-latest state is tolerated and resolved on read by taking
//! the newest `create_time`.

pub mod config;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use config::StoreConfig;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use uuid::Uuid;

use sensor_core::{AlarmKind, AlarmRecord, Result, SensorObservation, SensorType};

/// Store for per-type observation partitions.
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Inserts a new observation carrying `is_latest = true`.
    async fn insert_latest(&self, obs: &SensorObservation) -> Result<()>;

    /// Demotes every other latest observation for the sensor in the given
    /// partition. Returns the number of demoted records.
    async fn demote_others(
        &self,
        ty: SensorType,
        sensor_id: &str,
        keep_id: Uuid,
    ) -> Result<u64>;

    /// Reads the current latest observation, tie-breaking a transient
    /// two-latest overlap by newest `create_time`.
    async fn latest(&self, ty: SensorType, sensor_id: &str)
        -> Result<Option<SensorObservation>>;

    /// Flips `is_online = false` on the sensor's latest observation.
    async fn mark_offline(&self, ty: SensorType, sensor_id: &str) -> Result<u64>;
}

/// Store for the alarm-record partition.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Inserts a new alarm record carrying `is_latest = true`.
    async fn insert_latest(&self, alarm: &AlarmRecord) -> Result<()>;

    /// Demotes every other latest record for (sensor_id, kind). Returns the
    /// number of demoted records.
    async fn demote_others(
        &self,
        sensor_id: &str,
        kind: AlarmKind,
        keep_id: Uuid,
    ) -> Result<u64>;

    /// Reads the current latest alarm for (sensor_id, kind), newest
    /// `create_time` winning a transient overlap.
    async fn latest(&self, sensor_id: &str, kind: AlarmKind) -> Result<Option<AlarmRecord>>;

    /// Flips `is_online = false` on the latest record for (sensor_id, kind).
    async fn mark_offline(&self, sensor_id: &str, kind: AlarmKind) -> Result<u64>;
}

/// Persists an observation with the insert-then-demote pattern.
///
/// Callers must serialize invocations per sensor_id; two concurrent writers
/// for the same sensor can both insert before either demotion runs, leaving
/// two permanent latest rows.
pub async fn record_observation(
    store: &dyn ObservationStore,
    obs: &SensorObservation,
) -> Result<()> {
    store.insert_latest(obs).await?;
    store
        .demote_others(obs.sensor_type(), &obs.sensor_id, obs.id)
        .await?;
    Ok(())
}

/// Persists an alarm record with the insert-then-demote pattern. Same
/// per-sensor serialization requirement as [`record_observation`].
pub async fn record_alarm(store: &dyn AlarmStore, alarm: &AlarmRecord) -> Result<()> {
    store.insert_latest(alarm).await?;
    store
        .demote_others(&alarm.sensor_id, alarm.alarm_kind, alarm.id)
        .await?;
    Ok(())
}
