//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `fleethub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Core hub timings and capacities.
    pub hub: HubConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Adapter toggles and per-adapter settings.
    pub adapters: AdaptersConfig,
}

/// Core hub timings and capacities.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// A device with no ping for this long reads as offline.
    pub offline_after_secs: u64,
    /// Upper bound on a single command send.
    pub command_timeout_secs: u64,
    /// Broadcast channel capacity of the in-process event bus.
    pub event_bus_capacity: usize,
    /// Cadence of the time-trigger evaluation task.
    pub automation_poll_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-adapter toggles. The `mqtt` table is handed verbatim to the MQTT
/// adapter factory.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    /// Enable the virtual/demo adapter.
    pub virtual_enabled: bool,
    /// Enable the MQTT adapter.
    pub mqtt_enabled: bool,
    /// MQTT adapter settings, passed through to its factory.
    #[serde(default = "empty_table")]
    pub mqtt: serde_json::Value,
}

fn empty_table() -> serde_json::Value {
    serde_json::json!({})
}

impl Config {
    /// Load configuration from `fleethub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or a
    /// value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("fleethub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FLEETHUB_OFFLINE_AFTER_SECS") {
            if let Ok(secs) = val.parse() {
                self.hub.offline_after_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("FLEETHUB_MQTT_ENABLED") {
            self.adapters.mqtt_enabled = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Ok(val) = std::env::var("FLEETHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.offline_after_secs == 0 {
            return Err(ConfigError::Validation(
                "offline_after_secs must be non-zero".to_string(),
            ));
        }
        if self.hub.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "command_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.hub.automation_poll_secs == 0 {
            return Err(ConfigError::Validation(
                "automation_poll_secs must be non-zero".to_string(),
            ));
        }
        if self.hub.event_bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "event_bus_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            offline_after_secs: 60,
            command_timeout_secs: 10,
            event_bus_capacity: 256,
            automation_poll_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fleethubd=info,fleethub=info".to_string(),
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            mqtt_enabled: false,
            mqtt: empty_table(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.hub.offline_after_secs, 60);
        assert_eq!(config.hub.command_timeout_secs, 10);
        assert_eq!(config.hub.event_bus_capacity, 256);
        assert_eq!(config.hub.automation_poll_secs, 30);
        assert!(config.adapters.virtual_enabled);
        assert!(!config.adapters.mqtt_enabled);
    }

    #[test]
    fn should_parse_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.hub.offline_after_secs, 60);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [hub]
            offline_after_secs = 120
            command_timeout_secs = 5
            event_bus_capacity = 64
            automation_poll_secs = 10

            [logging]
            filter = 'debug'

            [adapters]
            virtual_enabled = false
            mqtt_enabled = true

            [adapters.mqtt]
            broker_host = 'mqtt.example.com'
            broker_port = 8883
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.hub.offline_after_secs, 120);
        assert_eq!(config.hub.command_timeout_secs, 5);
        assert_eq!(config.logging.filter, "debug");
        assert!(!config.adapters.virtual_enabled);
        assert!(config.adapters.mqtt_enabled);
        assert_eq!(config.adapters.mqtt["broker_host"], "mqtt.example.com");
        assert_eq!(config.adapters.mqtt["broker_port"], 8883);
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [hub]
            offline_after_secs = 300
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.hub.offline_after_secs, 300);
        assert_eq!(config.hub.command_timeout_secs, 10);
        assert!(config.adapters.virtual_enabled);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.hub.offline_after_secs, 60);
    }

    #[test]
    fn should_reject_zero_timings() {
        let mut config = Config::default();
        config.hub.offline_after_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hub.command_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hub.automation_poll_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hub.event_bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
