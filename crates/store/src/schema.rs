//! Postgres schema for the observation and alarm partitions.

use sqlx::PgPool;
use tracing::info;

use sensor_core::{Error, Result, SensorType};

/// Observation partition table for a sensor type.
pub fn observation_table(ty: SensorType) -> &'static str {
    match ty {
        SensorType::Ae => "observation_ae",
        SensorType::Tev => "observation_tev",
        SensorType::Uhf => "observation_uhf",
        SensorType::Temp => "observation_temp",
        SensorType::Mech => "observation_mech",
    }
}

/// Alarm partition table.
pub const ALARM_TABLE: &str = "alarm_record";

fn observation_ddl(table: &str) -> Vec<String> {
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                sensor_id TEXT NOT NULL,
                gateway_id TEXT NOT NULL,
                is_latest BOOLEAN NOT NULL,
                is_online BOOLEAN NOT NULL,
                create_time TIMESTAMPTZ NOT NULL,
                customer_id TEXT NOT NULL,
                site_id TEXT NOT NULL,
                equipment_id TEXT NOT NULL,
                point_id TEXT NOT NULL,
                alarm_level SMALLINT NOT NULL,
                alarm_flag SMALLINT NOT NULL,
                alarm_describe TEXT NOT NULL,
                measurement JSONB NOT NULL,
                device_status JSONB NOT NULL DEFAULT '{{}}'::jsonb
            )"
        ),
        // Forward migration for tables created before the column existed.
        format!(
            "ALTER TABLE {table}
             ADD COLUMN IF NOT EXISTS device_status JSONB NOT NULL DEFAULT '{{}}'::jsonb"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_latest
             ON {table} (sensor_id) WHERE is_latest"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_create_time
             ON {table} (sensor_id, create_time)"
        ),
    ]
}

fn alarm_ddl() -> Vec<String> {
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {ALARM_TABLE} (
                id UUID PRIMARY KEY,
                sensor_id TEXT NOT NULL,
                sensor_type TEXT NOT NULL,
                gateway_id TEXT NOT NULL,
                alarm_kind TEXT NOT NULL,
                alarm_level SMALLINT NOT NULL,
                alarm_describe TEXT NOT NULL,
                is_processed BOOLEAN NOT NULL,
                is_online BOOLEAN NOT NULL,
                is_latest BOOLEAN NOT NULL,
                customer_id TEXT NOT NULL,
                site_id TEXT NOT NULL,
                equipment_id TEXT NOT NULL,
                point_id TEXT NOT NULL,
                sensor_data_id UUID,
                create_time TIMESTAMPTZ NOT NULL
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ALARM_TABLE}_latest
             ON {ALARM_TABLE} (sensor_id, alarm_kind) WHERE is_latest"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{ALARM_TABLE}_site_unprocessed
             ON {ALARM_TABLE} (site_id) WHERE NOT is_processed"
        ),
    ]
}

/// Creates tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    let mut statements = Vec::new();
    for ty in SensorType::ALL {
        statements.extend(observation_ddl(observation_table(ty)));
    }
    statements.extend(alarm_ddl());

    for statement in statements {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| Error::store(format!("schema init failed: {e}")))?;
    }

    info!("Store schema initialized");
    Ok(())
}
