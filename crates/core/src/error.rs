//! Unified error types for the sensor pipeline.
//!
//! The taxonomy mirrors the failure modes of the ingestion path: admission,
//! decode, provisioning, store writes, counter bumps, and fan-out publishes.
//! Admission rejections are deliberately silent; everything else is logged
//! at the point of handling.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the sensor pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Gateway not enabled or sensor not provisioned. Dropped silently to
    /// bound storage growth from unprovisioned devices.
    #[error("message rejected at admission: gateway={gateway_id} sensor={sensor_id}")]
    AdmissionRejected {
        gateway_id: String,
        sensor_id: String,
    },

    /// Malformed JSON or missing required payload fields.
    #[error("decode error: {0}")]
    Decode(String),

    /// Sensor type not in the supported set.
    #[error("unsupported sensor type: {0}")]
    UnsupportedSensorType(String),

    /// Message was admitted but the provisioning lookup failed afterwards.
    /// The observation is never persisted unattributed.
    #[error("missing provisioning for sensor: {0}")]
    MissingProvisioning(String),

    /// Observation or alarm store write failed.
    #[error("store write failure: {0}")]
    Store(String),

    /// Work queue push/pop failed.
    #[error("queue error: {0}")]
    Queue(String),

    /// Abnormal counter operation failed.
    #[error("counter error: {0}")]
    Counter(String),

    /// Publish to a single subscriber group failed; delivery to the other
    /// groups continues.
    #[error("fan-out publish failure for group {group}: {reason}")]
    FanoutPublish { group: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn admission_rejected(gateway_id: impl Into<String>, sensor_id: impl Into<String>) -> Self {
        Self::AdmissionRejected {
            gateway_id: gateway_id.into(),
            sensor_id: sensor_id.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn unsupported_sensor_type(ty: impl Into<String>) -> Self {
        Self::UnsupportedSensorType(ty.into())
    }

    pub fn missing_provisioning(sensor_id: impl Into<String>) -> Self {
        Self::MissingProvisioning(sensor_id.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn counter(msg: impl Into<String>) -> Self {
        Self::Counter(msg.into())
    }

    pub fn fanout(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FanoutPublish {
            group: group.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the pipeline should log this error. Admission rejections are
    /// expected steady-state noise and stay quiet.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::AdmissionRejected { .. })
    }
}
