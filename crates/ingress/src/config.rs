//! MQTT ingress configuration.

use serde::{Deserialize, Serialize};

/// MQTT session settings for the gateway-facing broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttIngressConfig {
    /// Broker host
    #[serde(default = "default_host")]
    pub host: String,
    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client id for the ingress session
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Optional broker credentials
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Delay before re-polling after a session error, in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Event loop channel capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "gridwatch-ingress".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for MqttIngressConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}
