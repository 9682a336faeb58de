//! In-memory store backend for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use sensor_core::{AlarmKind, AlarmRecord, Result, SensorObservation, SensorType};

use crate::{AlarmStore, ObservationStore};

/// Stores every revision in memory, one Vec per observation partition plus
/// one for alarm records.
#[derive(Default)]
pub struct MemoryStore {
    observations: Mutex<HashMap<SensorType, Vec<SensorObservation>>>,
    alarms: Mutex<Vec<AlarmRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored revisions for a sensor, insertion order.
    pub fn observations_for(&self, ty: SensorType, sensor_id: &str) -> Vec<SensorObservation> {
        self.observations
            .lock()
            .get(&ty)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|o| o.sensor_id == sensor_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All stored alarm records for a sensor, insertion order.
    pub fn alarms_for(&self, sensor_id: &str) -> Vec<AlarmRecord> {
        self.alarms
            .lock()
            .iter()
            .filter(|a| a.sensor_id == sensor_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn insert_latest(&self, obs: &SensorObservation) -> Result<()> {
        self.observations
            .lock()
            .entry(obs.sensor_type())
            .or_default()
            .push(obs.clone());
        Ok(())
    }

    async fn demote_others(
        &self,
        ty: SensorType,
        sensor_id: &str,
        keep_id: Uuid,
    ) -> Result<u64> {
        let mut partitions = self.observations.lock();
        let Some(partition) = partitions.get_mut(&ty) else {
            return Ok(0);
        };
        let mut demoted = 0;
        for obs in partition.iter_mut() {
            if obs.sensor_id == sensor_id && obs.is_latest && obs.id != keep_id {
                obs.is_latest = false;
                demoted += 1;
            }
        }
        Ok(demoted)
    }

    async fn latest(
        &self,
        ty: SensorType,
        sensor_id: &str,
    ) -> Result<Option<SensorObservation>> {
        let partitions = self.observations.lock();
        Ok(partitions.get(&ty).and_then(|partition| {
            partition
                .iter()
                .filter(|o| o.sensor_id == sensor_id && o.is_latest)
                .max_by_key(|o| o.create_time)
                .cloned()
        }))
    }

    async fn mark_offline(&self, ty: SensorType, sensor_id: &str) -> Result<u64> {
        let mut partitions = self.observations.lock();
        let Some(partition) = partitions.get_mut(&ty) else {
            return Ok(0);
        };
        let mut updated = 0;
        for obs in partition.iter_mut() {
            if obs.sensor_id == sensor_id && obs.is_latest && obs.is_online {
                obs.is_online = false;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn insert_latest(&self, alarm: &AlarmRecord) -> Result<()> {
        self.alarms.lock().push(alarm.clone());
        Ok(())
    }

    async fn demote_others(
        &self,
        sensor_id: &str,
        kind: AlarmKind,
        keep_id: Uuid,
    ) -> Result<u64> {
        let mut alarms = self.alarms.lock();
        let mut demoted = 0;
        for alarm in alarms.iter_mut() {
            if alarm.sensor_id == sensor_id
                && alarm.alarm_kind == kind
                && alarm.is_latest
                && alarm.id != keep_id
            {
                alarm.is_latest = false;
                demoted += 1;
            }
        }
        Ok(demoted)
    }

    async fn latest(&self, sensor_id: &str, kind: AlarmKind) -> Result<Option<AlarmRecord>> {
        let alarms = self.alarms.lock();
        Ok(alarms
            .iter()
            .filter(|a| a.sensor_id == sensor_id && a.alarm_kind == kind && a.is_latest)
            .max_by_key(|a| a.create_time)
            .cloned())
    }

    async fn mark_offline(&self, sensor_id: &str, kind: AlarmKind) -> Result<u64> {
        let mut alarms = self.alarms.lock();
        let mut updated = 0;
        for alarm in alarms.iter_mut() {
            if alarm.sensor_id == sensor_id
                && alarm.alarm_kind == kind
                && alarm.is_latest
                && alarm.is_online
            {
                alarm.is_online = false;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
