//! Payload generators matching what field gateways actually publish.

use sensor_core::SensorMeta;

/// Telemetry topic for a gateway/sensor pair.
pub fn telemetry_topic(gateway_id: &str, sensor_id: &str) -> String {
    format!("/{gateway_id}/subnode/{sensor_id}/data_ctrl/property")
}

/// Device event topic for a gateway/sensor pair.
pub fn event_topic(gateway_id: &str, sensor_id: &str) -> String {
    format!("/{gateway_id}/subnode/{sensor_id}/common/event")
}

/// Standard tenant linkage used across the suite.
pub fn meta() -> SensorMeta {
    meta_for("customer1", "site1")
}

pub fn meta_for(customer_id: &str, site_id: &str) -> SensorMeta {
    SensorMeta {
        customer_id: customer_id.into(),
        site_id: site_id.into(),
        equipment_id: "switchgear7".into(),
        point_id: "pointA".into(),
    }
}

/// TEV payload with a given alert level, plus the gateway's housekeeping
/// blocks.
pub fn tev_payload(alert_level: i64) -> String {
    serde_json::json!({
        "sensor_type": "TEV",
        "params": {
            "data": {
                "amp": 12.5,
                "acqtime": "2024-01-01 10:00:00",
                "alert_level": alert_level,
                "alert_describe": if alert_level > 0 { "arc discharge" } else { "" }
            },
            "status": {"battery": 87},
            "wparam": {"interval": 300}
        }
    })
    .to_string()
}

/// AE payload with no on-device alert fields.
pub fn ae_payload() -> String {
    serde_json::json!({
        "sensor_type": "AE",
        "params": {"data": {
            "maxvalue": 3.1, "rmsvalue": 1.2, "harmonic1": 0.4,
            "harmonic2": 0.2, "gain": 20.0,
            "acqtime": "2024-06-15 08:30:00"
        }}
    })
    .to_string()
}

/// UHF payload with a short waveform.
pub fn uhf_payload() -> String {
    serde_json::json!({
        "sensor_type": "UHF",
        "params": {"data": {
            "prps": [0.1, 0.4, 0.2],
            "rangemin": -80.0, "rangemax": 0.0,
            "filter": 1, "np": 50, "gpp": 64,
            "ampmax": -12.5, "ampmean": -40.2,
            "acqtime": "20240101100000"
        }}
    })
    .to_string()
}

/// Temperature payload.
pub fn temp_payload(t: f64) -> String {
    serde_json::json!({
        "sensor_type": "Temp",
        "params": {"data": {"T": t, "acqtime": "2024-01-01 10:00:00"}}
    })
    .to_string()
}

/// Mech payload with channel blocks and an alert result.
pub fn mech_payload() -> String {
    serde_json::json!({
        "sensor_type": "Mech",
        "acqtime": "2024-01-01 10:00:00",
        "params": {
            "Mech_On_Coil_I": {"wave": [0.0, 1.2], "peak": 1.2},
            "Mech_Motor_I": {"wave": [3.3]},
            "Mech_Results": {"alert_level": 1, "alert_describe": "slow close"}
        }
    })
    .to_string()
}

/// Battery-low device event.
pub fn battery_event(level: i64) -> String {
    serde_json::json!({
        "sensor_type": "TEV",
        "params": {"battery_alert": {"time": "2024-01-01 11:00:00", "battery_alertl": level}}
    })
    .to_string()
}

/// Offline device event.
pub fn offline_event(level: i64) -> String {
    serde_json::json!({
        "sensor_type": "TEV",
        "params": {"online_alert": {"time": "2024-01-01 11:00:00", "online_alertl": level}}
    })
    .to_string()
}
