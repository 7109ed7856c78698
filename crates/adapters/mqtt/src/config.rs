//! MQTT adapter configuration.

use fleethub_domain::error::ConfigError;
use serde::Deserialize;

/// Configuration for the MQTT adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Base topic prefix for all fleethub MQTT communication.
    pub base_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// How long to wait for the broker acknowledgement on connect, in seconds.
    pub connect_timeout_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "fleethub".to_string(),
            base_topic: "fleethub".to_string(),
            keep_alive_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

impl MqttConfig {
    /// Parse from the adapter-config payload the protocol registry hands to
    /// factories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the payload does not match the
    /// schema.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value.clone()).map_err(|err| ConfigError::Invalid {
            protocol: "mqtt".to_string(),
            reason: err.to_string(),
        })
    }
}
