//! Sensor and alarm domain enums plus the queue-borne raw message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported sensor types. One observation store partition exists per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    #[serde(rename = "AE")]
    Ae,
    #[serde(rename = "TEV")]
    Tev,
    #[serde(rename = "UHF")]
    Uhf,
    #[serde(rename = "Temp")]
    Temp,
    #[serde(rename = "Mech")]
    Mech,
}

impl SensorType {
    pub const ALL: [SensorType; 5] = [
        SensorType::Ae,
        SensorType::Tev,
        SensorType::Uhf,
        SensorType::Temp,
        SensorType::Mech,
    ];

    /// Wire name as published by field gateways.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ae => "AE",
            Self::Tev => "TEV",
            Self::Uhf => "UHF",
            Self::Temp => "Temp",
            Self::Mech => "Mech",
        }
    }

    /// Parses a wire name, rejecting anything outside the supported set.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "AE" => Ok(Self::Ae),
            "TEV" => Ok(Self::Tev),
            "UHF" => Ok(Self::Uhf),
            "Temp" => Ok(Self::Temp),
            "Mech" => Ok(Self::Mech),
            other => Err(Error::unsupported_sensor_type(other)),
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alarm severity. Wire payloads carry the numeric value in `alert_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum AlarmLevel {
    Normal,
    Warning,
    Alarm,
}

impl AlarmLevel {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::Warning => 1,
            Self::Alarm => 2,
        }
    }

    pub fn from_i64(v: i64) -> Result<Self> {
        match v {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Alarm),
            other => Err(Error::decode(format!("invalid alarm level: {other}"))),
        }
    }

    /// Warning and Alarm feed the abnormal counters; Normal does not.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl From<AlarmLevel> for i64 {
    fn from(level: AlarmLevel) -> Self {
        level.as_i64()
    }
}

impl TryFrom<i64> for AlarmLevel {
    type Error = Error;

    fn try_from(v: i64) -> Result<Self> {
        Self::from_i64(v)
    }
}

/// Push flag attached by the gateway's on-device alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum AlarmFlag {
    NoPush,
    Push,
}

impl AlarmFlag {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::NoPush => 0,
            Self::Push => 1,
        }
    }
}

impl From<AlarmFlag> for i64 {
    fn from(flag: AlarmFlag) -> Self {
        flag.as_i64()
    }
}

impl TryFrom<i64> for AlarmFlag {
    type Error = Error;

    fn try_from(v: i64) -> Result<Self> {
        match v {
            0 => Ok(Self::NoPush),
            1 => Ok(Self::Push),
            other => Err(Error::decode(format!("invalid alarm flag: {other}"))),
        }
    }
}

impl Default for AlarmFlag {
    fn default() -> Self {
        Self::NoPush
    }
}

/// Alarm record kind. Point alarms derive from telemetry; device alarms from
/// gateway events (battery low, offline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    PointAlarm,
    DeviceAlarm,
}

impl AlarmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointAlarm => "point_alarm",
            Self::DeviceAlarm => "device_alarm",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "point_alarm" => Ok(Self::PointAlarm),
            "device_alarm" => Ok(Self::DeviceAlarm),
            other => Err(Error::decode(format!("invalid alarm kind: {other}"))),
        }
    }
}

/// Kind of message carried on the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgKind {
    /// `/{gateway}/subnode/{sensor}/data_ctrl/property`
    Telemetry,
    /// `/{gateway}/subnode/{sensor}/common/event`
    DeviceEvent,
}

/// Tenant linkage for a provisioned sensor, owned by the external CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorMeta {
    pub customer_id: String,
    pub site_id: String,
    pub equipment_id: String,
    pub point_id: String,
}

/// Ephemeral wire message between ingress and processor. Lives only on the
/// work queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTelemetryMessage {
    pub msg_kind: MsgKind,
    pub gateway_id: String,
    pub sensor_id: String,
    pub raw_payload: String,
    pub enqueue_time: DateTime<Utc>,
}

impl RawTelemetryMessage {
    pub fn new(
        msg_kind: MsgKind,
        gateway_id: impl Into<String>,
        sensor_id: impl Into<String>,
        raw_payload: impl Into<String>,
    ) -> Self {
        Self {
            msg_kind,
            gateway_id: gateway_id.into(),
            sensor_id: sensor_id.into(),
            raw_payload: raw_payload.into(),
            enqueue_time: Utc::now(),
        }
    }
}
