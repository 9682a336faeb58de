//! Observation and alarm record models.
//!
//! A `SensorObservation` is one versioned time-series record; the store keeps
//! every revision and maintains a single `is_latest` row per sensor within a
//! type partition. An `AlarmRecord` is the alarm state derived from an
//! observation (point alarm) or a gateway event (device alarm).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sensor::{AlarmFlag, AlarmKind, AlarmLevel, SensorMeta, SensorType};

/// Acoustic emission readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AeMeasurement {
    pub maxvalue: f64,
    pub rmsvalue: f64,
    pub harmonic1: f64,
    pub harmonic2: f64,
    pub gain: f64,
}

/// Transient earth voltage reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TevMeasurement {
    pub amp: f64,
}

/// Temperature reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempMeasurement {
    #[serde(rename = "T")]
    pub t: f64,
}

/// Ultra-high-frequency partial discharge readings. `prps` is the
/// phase-resolved pulse sequence waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UhfMeasurement {
    pub prps: Vec<f64>,
    pub rangemin: f64,
    pub rangemax: f64,
    pub filter: i64,
    pub np: i64,
    pub gpp: i64,
    pub ampmax: f64,
    pub ampmean: f64,
}

/// Mechanical characteristics channels. Each block is the gateway's raw
/// channel recording (waveform samples and per-channel statistics) and is
/// stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechMeasurement {
    #[serde(rename = "Mech_On_Coil_I", default)]
    pub on_coil_current: serde_json::Value,
    #[serde(rename = "Mech_Off_Coil_I", default)]
    pub off_coil_current: serde_json::Value,
    #[serde(rename = "Mech_Motor_I", default)]
    pub motor_current: serde_json::Value,
    #[serde(rename = "Mech_CT_A_V", default)]
    pub ct_a_voltage: serde_json::Value,
    #[serde(rename = "Mech_CT_B_V", default)]
    pub ct_b_voltage: serde_json::Value,
    #[serde(rename = "Mech_CT_C_V", default)]
    pub ct_c_voltage: serde_json::Value,
    #[serde(rename = "Mech_DIS_I", default)]
    pub disconnect_current: serde_json::Value,
}

/// Type-specific measurement fields, tagged by sensor type on the wire and
/// in fan-out frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor_type")]
pub enum Measurement {
    #[serde(rename = "AE")]
    Ae(AeMeasurement),
    #[serde(rename = "TEV")]
    Tev(TevMeasurement),
    #[serde(rename = "UHF")]
    Uhf(UhfMeasurement),
    #[serde(rename = "Temp")]
    Temp(TempMeasurement),
    #[serde(rename = "Mech")]
    Mech(MechMeasurement),
}

impl Measurement {
    pub fn sensor_type(&self) -> SensorType {
        match self {
            Self::Ae(_) => SensorType::Ae,
            Self::Tev(_) => SensorType::Tev,
            Self::Uhf(_) => SensorType::Uhf,
            Self::Temp(_) => SensorType::Temp,
            Self::Mech(_) => SensorType::Mech,
        }
    }
}

/// Codec output: everything decoded from one telemetry payload, before
/// tenant attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalObservation {
    pub create_time: DateTime<Utc>,
    pub alarm_level: AlarmLevel,
    pub alarm_flag: AlarmFlag,
    pub alarm_describe: String,
    pub measurement: Measurement,
    /// Gateway housekeeping fields (`params.status` and `params.wparam`)
    /// folded into the document as-is. Empty for Mech payloads.
    pub device_status: serde_json::Map<String, serde_json::Value>,
}

/// One versioned time-series record in a per-type store partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorObservation {
    pub id: Uuid,
    pub sensor_id: String,
    pub gateway_id: String,
    pub is_latest: bool,
    pub is_online: bool,
    pub create_time: DateTime<Utc>,
    #[serde(flatten)]
    pub meta: SensorMeta,
    pub alarm_level: AlarmLevel,
    pub alarm_flag: AlarmFlag,
    pub alarm_describe: String,
    #[serde(flatten)]
    pub measurement: Measurement,
    /// Gateway housekeeping fields, inlined into the document.
    #[serde(flatten)]
    pub device_status: serde_json::Map<String, serde_json::Value>,
}

impl SensorObservation {
    /// Builds a new latest observation from a decoded payload and resolved
    /// provisioning.
    pub fn from_canonical(
        canonical: CanonicalObservation,
        gateway_id: impl Into<String>,
        sensor_id: impl Into<String>,
        meta: SensorMeta,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sensor_id: sensor_id.into(),
            gateway_id: gateway_id.into(),
            is_latest: true,
            is_online: true,
            create_time: canonical.create_time,
            meta,
            alarm_level: canonical.alarm_level,
            alarm_flag: canonical.alarm_flag,
            alarm_describe: canonical.alarm_describe,
            measurement: canonical.measurement,
            device_status: canonical.device_status,
        }
    }

    pub fn sensor_type(&self) -> SensorType {
        self.measurement.sensor_type()
    }
}

/// Derived alarm state. Every observation or device event creates a fresh
/// unprocessed record; the processed transition comes only from the external
/// operator flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: Uuid,
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub gateway_id: String,
    pub alarm_kind: AlarmKind,
    pub alarm_level: AlarmLevel,
    pub alarm_describe: String,
    pub is_processed: bool,
    pub is_online: bool,
    pub is_latest: bool,
    #[serde(flatten)]
    pub meta: SensorMeta,
    /// Back-reference to the observation this alarm derives from. Device
    /// alarms have none.
    pub sensor_data_id: Option<Uuid>,
    pub create_time: DateTime<Utc>,
}

impl AlarmRecord {
    /// Point alarm derived from a freshly persisted observation.
    pub fn from_observation(observation: &SensorObservation) -> Self {
        Self {
            id: Uuid::new_v4(),
            sensor_id: observation.sensor_id.clone(),
            sensor_type: observation.sensor_type(),
            gateway_id: observation.gateway_id.clone(),
            alarm_kind: AlarmKind::PointAlarm,
            alarm_level: observation.alarm_level,
            alarm_describe: observation.alarm_describe.clone(),
            is_processed: false,
            is_online: true,
            is_latest: true,
            meta: observation.meta.clone(),
            sensor_data_id: Some(observation.id),
            create_time: observation.create_time,
        }
    }
}
