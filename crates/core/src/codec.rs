//! Per-sensor-type payload codecs.
//!
//! Gateways publish UTF-8 JSON with a `params` envelope whose shape depends
//! on the sensor type. Every type except Mech nests its readings and the
//! shared alert fields under `params.data`; Mech spreads named channel
//! blocks directly under `params`, carries its alert result in
//! `params.Mech_Results`, and takes its timestamp from a top-level
//! `acqtime` instead of the data envelope.
//!
//! A codec either yields a full [`CanonicalObservation`] or a decode error;
//! there is no partial decode.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::observation::{
    AeMeasurement, CanonicalObservation, Measurement, MechMeasurement, TempMeasurement,
    TevMeasurement, UhfMeasurement,
};
use crate::sensor::{AlarmFlag, AlarmLevel, SensorType};

/// Parses a gateway acquisition timestamp.
///
/// Gateways are inconsistent about separators ("2024-01-01 10:00:00",
/// "20240101100000", "2024/01/01T10:00:00"), so we strip everything except
/// digits and parse the leading 14 as `%Y%m%d%H%M%S`.
pub fn parse_acquisition_time(s: &str) -> Result<DateTime<Utc>> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).take(14).collect();
    if digits.len() != 14 {
        return Err(Error::decode(format!("invalid acqtime: {s:?}")));
    }
    let naive = NaiveDateTime::parse_from_str(&digits, "%Y%m%d%H%M%S")
        .map_err(|e| Error::decode(format!("invalid acqtime {s:?}: {e}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Reads the top-level `sensor_type` discriminator from a raw payload.
pub fn payload_sensor_type(raw: &Value) -> Result<SensorType> {
    let ty = raw
        .get("sensor_type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decode("payload missing sensor_type"))?;
    SensorType::parse(ty)
}

/// Shared alert fields carried next to the measurement readings.
#[derive(Debug, Deserialize)]
struct AlertFields {
    acqtime: String,
    #[serde(default)]
    alert_level: Option<i64>,
    #[serde(default)]
    alert_describe: Option<String>,
    #[serde(default)]
    alert_flag: Option<i64>,
}

impl AlertFields {
    /// Alarm level and describe default to Normal/"" when the gateway's
    /// on-device alerting is silent.
    fn into_parts(self) -> Result<(DateTime<Utc>, AlarmLevel, AlarmFlag, String)> {
        let create_time = parse_acquisition_time(&self.acqtime)?;
        let level = match self.alert_level {
            Some(v) => AlarmLevel::from_i64(v)?,
            None => AlarmLevel::Normal,
        };
        let flag = match self.alert_flag {
            Some(v) => AlarmFlag::try_from(v)?,
            None => AlarmFlag::NoPush,
        };
        Ok((create_time, level, flag, self.alert_describe.unwrap_or_default()))
    }
}

/// `{"params": {"data": {...}}}` envelope used by all non-Mech types.
/// Gateways may also report `status` and `wparam` housekeeping blocks next
/// to the data; their fields fold into the stored document.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    params: DataParams<T>,
}

#[derive(Debug, Deserialize)]
struct DataParams<T> {
    data: T,
    #[serde(default)]
    status: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    wparam: Option<serde_json::Map<String, Value>>,
}

fn decode_data_envelope<T: serde::de::DeserializeOwned>(
    ty: SensorType,
    raw: &Value,
) -> Result<(T, AlertFields, serde_json::Map<String, Value>)> {
    let envelope: DataEnvelope<Value> = serde_json::from_value(raw.clone())
        .map_err(|e| Error::decode(format!("{ty} payload missing params.data: {e}")))?;
    let data = envelope.params.data;
    let readings: T = serde_json::from_value(data.clone())
        .map_err(|e| Error::decode(format!("{ty} data fields: {e}")))?;
    let alert: AlertFields = serde_json::from_value(data)
        .map_err(|e| Error::decode(format!("{ty} alert fields: {e}")))?;

    let mut device_status = envelope.params.status.unwrap_or_default();
    // wparam wins on a key clash.
    device_status.extend(envelope.params.wparam.unwrap_or_default());
    Ok((readings, alert, device_status))
}

/// Decodes one sensor type's raw payload into the canonical observation.
pub trait SensorCodec: Send + Sync {
    fn sensor_type(&self) -> SensorType;

    fn decode(&self, raw: &Value) -> Result<CanonicalObservation>;
}

macro_rules! data_codec {
    ($codec:ident, $ty:expr, $readings:ty, $variant:expr) => {
        pub struct $codec;

        impl SensorCodec for $codec {
            fn sensor_type(&self) -> SensorType {
                $ty
            }

            fn decode(&self, raw: &Value) -> Result<CanonicalObservation> {
                let (readings, alert, device_status) =
                    decode_data_envelope::<$readings>($ty, raw)?;
                let (create_time, alarm_level, alarm_flag, alarm_describe) =
                    alert.into_parts()?;
                Ok(CanonicalObservation {
                    create_time,
                    alarm_level,
                    alarm_flag,
                    alarm_describe,
                    measurement: $variant(readings),
                    device_status,
                })
            }
        }
    };
}

data_codec!(AeCodec, SensorType::Ae, AeMeasurement, Measurement::Ae);
data_codec!(TevCodec, SensorType::Tev, TevMeasurement, Measurement::Tev);
data_codec!(TempCodec, SensorType::Temp, TempMeasurement, Measurement::Temp);
data_codec!(UhfCodec, SensorType::Uhf, UhfMeasurement, Measurement::Uhf);

/// Mech alert result block; every field optional, defaults matching the
/// other types' silent-alert behavior.
#[derive(Debug, Default, Deserialize)]
struct MechResults {
    #[serde(default)]
    alert_level: Option<i64>,
    #[serde(default)]
    alert_describe: Option<String>,
    #[serde(default)]
    alert_flag: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MechEnvelope {
    acqtime: String,
    params: MechParams,
}

#[derive(Debug, Deserialize)]
struct MechParams {
    #[serde(flatten)]
    channels: MechMeasurement,
    #[serde(rename = "Mech_Results", default)]
    results: Option<MechResults>,
}

pub struct MechCodec;

impl SensorCodec for MechCodec {
    fn sensor_type(&self) -> SensorType {
        SensorType::Mech
    }

    fn decode(&self, raw: &Value) -> Result<CanonicalObservation> {
        let envelope: MechEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| Error::decode(format!("Mech payload: {e}")))?;
        let create_time = parse_acquisition_time(&envelope.acqtime)?;
        let results = envelope.params.results.unwrap_or_default();
        let alarm_level = match results.alert_level {
            Some(v) => AlarmLevel::from_i64(v)?,
            None => AlarmLevel::Normal,
        };
        let alarm_flag = match results.alert_flag {
            Some(v) => AlarmFlag::try_from(v)?,
            None => AlarmFlag::NoPush,
        };
        Ok(CanonicalObservation {
            create_time,
            alarm_level,
            alarm_flag,
            alarm_describe: results.alert_describe.unwrap_or_default(),
            measurement: Measurement::Mech(envelope.params.channels),
            device_status: serde_json::Map::new(),
        })
    }
}

/// Codec registry keyed on the closed sensor-type enum.
pub struct CodecRegistry {
    codecs: HashMap<SensorType, Box<dyn SensorCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        let mut codecs: HashMap<SensorType, Box<dyn SensorCodec>> = HashMap::new();
        codecs.insert(SensorType::Ae, Box::new(AeCodec));
        codecs.insert(SensorType::Tev, Box::new(TevCodec));
        codecs.insert(SensorType::Uhf, Box::new(UhfCodec));
        codecs.insert(SensorType::Temp, Box::new(TempCodec));
        codecs.insert(SensorType::Mech, Box::new(MechCodec));
        Self { codecs }
    }

    pub fn get(&self, ty: SensorType) -> &dyn SensorCodec {
        // The registry covers the closed enum exhaustively.
        self.codecs[&ty].as_ref()
    }

    /// Decodes a raw telemetry payload, dispatching on its `sensor_type`.
    pub fn decode(&self, raw: &Value) -> Result<CanonicalObservation> {
        let ty = payload_sensor_type(raw)?;
        self.get(ty).decode(raw)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded gateway device event (battery low / offline).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEventAlert {
    pub create_time: DateTime<Utc>,
    pub alarm_level: AlarmLevel,
    pub alarm_describe: String,
    /// Offline events flip this to false; battery events leave the sensor
    /// online.
    pub is_online: bool,
}

#[derive(Debug, Deserialize)]
struct BatteryAlert {
    time: String,
    #[serde(rename = "battery_alertl", default)]
    level: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OnlineAlert {
    time: String,
    #[serde(rename = "online_alertl", default)]
    level: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DeviceEventParams {
    #[serde(default)]
    battery_alert: Option<BatteryAlert>,
    #[serde(default)]
    online_alert: Option<OnlineAlert>,
}

#[derive(Debug, Deserialize)]
struct DeviceEventEnvelope {
    params: DeviceEventParams,
}

/// Event alert levels are a bare 0/1 flag: 1 means alarm.
fn event_level(level: Option<i64>) -> AlarmLevel {
    if level == Some(1) {
        AlarmLevel::Alarm
    } else {
        AlarmLevel::Normal
    }
}

/// Decodes a device-alarm event payload. Battery takes precedence when a
/// gateway sends both blocks.
pub fn decode_device_event(raw: &Value) -> Result<DeviceEventAlert> {
    let envelope: DeviceEventEnvelope = serde_json::from_value(raw.clone())
        .map_err(|e| Error::decode(format!("device event payload: {e}")))?;

    if let Some(battery) = envelope.params.battery_alert {
        return Ok(DeviceEventAlert {
            create_time: parse_acquisition_time(&battery.time)?,
            alarm_level: event_level(battery.level),
            alarm_describe: "battery low alarm".to_string(),
            is_online: true,
        });
    }
    if let Some(online) = envelope.params.online_alert {
        return Ok(DeviceEventAlert {
            create_time: parse_acquisition_time(&online.time)?,
            alarm_level: event_level(online.level),
            alarm_describe: "offline alarm".to_string(),
            is_online: false,
        });
    }
    Err(Error::decode(
        "device event carries neither battery_alert nor online_alert",
    ))
}
