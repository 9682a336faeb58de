//! Postgres store backend.
//!
//! Observations land in one table per sensor type; the type-specific
//! measurement fields are stored as a tagged JSONB document so the fan-out
//! frame can be rebuilt without a per-type row mapper.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use sensor_core::{
    AlarmKind, AlarmLevel, AlarmRecord, Error, Measurement, Result, SensorMeta,
    SensorObservation, SensorType,
};
use telemetry::metrics;

use crate::config::StoreConfig;
use crate::schema::{observation_table, ALARM_TABLE};
use crate::{AlarmStore, ObservationStore};

/// Postgres-backed observation and alarm store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool per the store configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect(&config.url)
            .await
            .map_err(|e| Error::store(format!("postgres connect failed: {e}")))?;

        info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip liveness probe.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("postgres ping failed: {e}")))?;
        Ok(())
    }
}

fn db_err(context: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| Error::store(format!("{context}: {e}"))
}

fn observation_from_row(row: &PgRow) -> Result<SensorObservation> {
    let measurement: serde_json::Value = row
        .try_get("measurement")
        .map_err(db_err("observation row: measurement"))?;
    let measurement: Measurement = serde_json::from_value(measurement)?;

    let device_status: serde_json::Value = row
        .try_get("device_status")
        .map_err(db_err("observation row: device_status"))?;
    let device_status = match device_status {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    let alarm_level: i16 = row
        .try_get("alarm_level")
        .map_err(db_err("observation row: alarm_level"))?;
    let alarm_flag: i16 = row
        .try_get("alarm_flag")
        .map_err(db_err("observation row: alarm_flag"))?;

    Ok(SensorObservation {
        id: row.try_get("id").map_err(db_err("observation row: id"))?,
        sensor_id: row
            .try_get("sensor_id")
            .map_err(db_err("observation row: sensor_id"))?,
        gateway_id: row
            .try_get("gateway_id")
            .map_err(db_err("observation row: gateway_id"))?,
        is_latest: row
            .try_get("is_latest")
            .map_err(db_err("observation row: is_latest"))?,
        is_online: row
            .try_get("is_online")
            .map_err(db_err("observation row: is_online"))?,
        create_time: row
            .try_get("create_time")
            .map_err(db_err("observation row: create_time"))?,
        meta: SensorMeta {
            customer_id: row
                .try_get("customer_id")
                .map_err(db_err("observation row: customer_id"))?,
            site_id: row
                .try_get("site_id")
                .map_err(db_err("observation row: site_id"))?,
            equipment_id: row
                .try_get("equipment_id")
                .map_err(db_err("observation row: equipment_id"))?,
            point_id: row
                .try_get("point_id")
                .map_err(db_err("observation row: point_id"))?,
        },
        alarm_level: AlarmLevel::from_i64(alarm_level as i64)?,
        alarm_flag: (alarm_flag as i64).try_into()?,
        alarm_describe: row
            .try_get("alarm_describe")
            .map_err(db_err("observation row: alarm_describe"))?,
        measurement,
        device_status,
    })
}

fn alarm_from_row(row: &PgRow) -> Result<AlarmRecord> {
    let sensor_type: String = row
        .try_get("sensor_type")
        .map_err(db_err("alarm row: sensor_type"))?;
    let alarm_kind: String = row
        .try_get("alarm_kind")
        .map_err(db_err("alarm row: alarm_kind"))?;
    let alarm_level: i16 = row
        .try_get("alarm_level")
        .map_err(db_err("alarm row: alarm_level"))?;

    Ok(AlarmRecord {
        id: row.try_get("id").map_err(db_err("alarm row: id"))?,
        sensor_id: row
            .try_get("sensor_id")
            .map_err(db_err("alarm row: sensor_id"))?,
        sensor_type: SensorType::parse(&sensor_type)?,
        gateway_id: row
            .try_get("gateway_id")
            .map_err(db_err("alarm row: gateway_id"))?,
        alarm_kind: AlarmKind::parse(&alarm_kind)?,
        alarm_level: AlarmLevel::from_i64(alarm_level as i64)?,
        alarm_describe: row
            .try_get("alarm_describe")
            .map_err(db_err("alarm row: alarm_describe"))?,
        is_processed: row
            .try_get("is_processed")
            .map_err(db_err("alarm row: is_processed"))?,
        is_online: row
            .try_get("is_online")
            .map_err(db_err("alarm row: is_online"))?,
        is_latest: row
            .try_get("is_latest")
            .map_err(db_err("alarm row: is_latest"))?,
        meta: SensorMeta {
            customer_id: row
                .try_get("customer_id")
                .map_err(db_err("alarm row: customer_id"))?,
            site_id: row
                .try_get("site_id")
                .map_err(db_err("alarm row: site_id"))?,
            equipment_id: row
                .try_get("equipment_id")
                .map_err(db_err("alarm row: equipment_id"))?,
            point_id: row
                .try_get("point_id")
                .map_err(db_err("alarm row: point_id"))?,
        },
        sensor_data_id: row
            .try_get("sensor_data_id")
            .map_err(db_err("alarm row: sensor_data_id"))?,
        create_time: row
            .try_get("create_time")
            .map_err(db_err("alarm row: create_time"))?,
    })
}

#[async_trait]
impl ObservationStore for PostgresStore {
    async fn insert_latest(&self, obs: &SensorObservation) -> Result<()> {
        let table = observation_table(obs.sensor_type());
        let query = format!(
            "INSERT INTO {table} (
                id, sensor_id, gateway_id, is_latest, is_online, create_time,
                customer_id, site_id, equipment_id, point_id,
                alarm_level, alarm_flag, alarm_describe, measurement, device_status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        );

        let start = Instant::now();
        let result = sqlx::query(&query)
            .bind(obs.id)
            .bind(&obs.sensor_id)
            .bind(&obs.gateway_id)
            .bind(obs.is_latest)
            .bind(obs.is_online)
            .bind(obs.create_time)
            .bind(&obs.meta.customer_id)
            .bind(&obs.meta.site_id)
            .bind(&obs.meta.equipment_id)
            .bind(&obs.meta.point_id)
            .bind(obs.alarm_level.as_i64() as i16)
            .bind(obs.alarm_flag.as_i64() as i16)
            .bind(&obs.alarm_describe)
            .bind(serde_json::to_value(&obs.measurement)?)
            .bind(serde_json::Value::Object(obs.device_status.clone()))
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                metrics().observations_written.inc();
                metrics()
                    .store_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
                Ok(())
            }
            Err(e) => {
                metrics().store_write_errors.inc();
                Err(Error::store(format!("observation insert into {table} failed: {e}")))
            }
        }
    }

    async fn demote_others(
        &self,
        ty: SensorType,
        sensor_id: &str,
        keep_id: Uuid,
    ) -> Result<u64> {
        let table = observation_table(ty);
        let query = format!(
            "UPDATE {table} SET is_latest = FALSE
             WHERE sensor_id = $1 AND is_latest AND id <> $2"
        );
        let result = sqlx::query(&query)
            .bind(sensor_id)
            .bind(keep_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("observation demote in {table} failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn latest(
        &self,
        ty: SensorType,
        sensor_id: &str,
    ) -> Result<Option<SensorObservation>> {
        let table = observation_table(ty);
        let query = format!(
            "SELECT * FROM {table}
             WHERE sensor_id = $1 AND is_latest
             ORDER BY create_time DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(sensor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::store(format!("observation read from {table} failed: {e}")))?;
        row.as_ref().map(observation_from_row).transpose()
    }

    async fn mark_offline(&self, ty: SensorType, sensor_id: &str) -> Result<u64> {
        let table = observation_table(ty);
        let query = format!(
            "UPDATE {table} SET is_online = FALSE
             WHERE sensor_id = $1 AND is_latest AND is_online"
        );
        let result = sqlx::query(&query)
            .bind(sensor_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("observation offline in {table} failed: {e}")))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AlarmStore for PostgresStore {
    async fn insert_latest(&self, alarm: &AlarmRecord) -> Result<()> {
        let query = format!(
            "INSERT INTO {ALARM_TABLE} (
                id, sensor_id, sensor_type, gateway_id, alarm_kind,
                alarm_level, alarm_describe, is_processed, is_online, is_latest,
                customer_id, site_id, equipment_id, point_id,
                sensor_data_id, create_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        );

        let result = sqlx::query(&query)
            .bind(alarm.id)
            .bind(&alarm.sensor_id)
            .bind(alarm.sensor_type.as_str())
            .bind(&alarm.gateway_id)
            .bind(alarm.alarm_kind.as_str())
            .bind(alarm.alarm_level.as_i64() as i16)
            .bind(&alarm.alarm_describe)
            .bind(alarm.is_processed)
            .bind(alarm.is_online)
            .bind(alarm.is_latest)
            .bind(&alarm.meta.customer_id)
            .bind(&alarm.meta.site_id)
            .bind(&alarm.meta.equipment_id)
            .bind(&alarm.meta.point_id)
            .bind(alarm.sensor_data_id)
            .bind(alarm.create_time)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                metrics().alarms_written.inc();
                Ok(())
            }
            Err(e) => {
                metrics().store_write_errors.inc();
                Err(Error::store(format!("alarm insert failed: {e}")))
            }
        }
    }

    async fn demote_others(
        &self,
        sensor_id: &str,
        kind: AlarmKind,
        keep_id: Uuid,
    ) -> Result<u64> {
        let query = format!(
            "UPDATE {ALARM_TABLE} SET is_latest = FALSE
             WHERE sensor_id = $1 AND alarm_kind = $2 AND is_latest AND id <> $3"
        );
        let result = sqlx::query(&query)
            .bind(sensor_id)
            .bind(kind.as_str())
            .bind(keep_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("alarm demote failed: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn latest(&self, sensor_id: &str, kind: AlarmKind) -> Result<Option<AlarmRecord>> {
        let query = format!(
            "SELECT * FROM {ALARM_TABLE}
             WHERE sensor_id = $1 AND alarm_kind = $2 AND is_latest
             ORDER BY create_time DESC LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(sensor_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::store(format!("alarm read failed: {e}")))?;
        row.as_ref().map(alarm_from_row).transpose()
    }

    async fn mark_offline(&self, sensor_id: &str, kind: AlarmKind) -> Result<u64> {
        let query = format!(
            "UPDATE {ALARM_TABLE} SET is_online = FALSE
             WHERE sensor_id = $1 AND alarm_kind = $2 AND is_latest AND is_online"
        );
        let result = sqlx::query(&query)
            .bind(sensor_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::store(format!("alarm offline failed: {e}")))?;
        Ok(result.rows_affected())
    }
}
