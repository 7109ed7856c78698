//! Protocol registry — maps protocol names to adapter factories.
//!
//! Factories construct adapters from a free-form JSON configuration so the
//! set of supported protocols can be assembled at wiring time without the
//! core knowing any concrete adapter type.

use std::collections::HashMap;
use std::sync::Arc;

use fleethub_domain::error::ConfigError;

use crate::ports::ProtocolAdapter;

/// Builds an adapter from its JSON configuration, or rejects the
/// configuration.
pub type AdapterFactory =
    Box<dyn Fn(&serde_json::Value) -> Result<Arc<dyn ProtocolAdapter>, ConfigError> + Send + Sync>;

/// Runtime registry of adapter factories, keyed by protocol name.
#[derive(Default)]
pub struct ProtocolRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl ProtocolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous registration
    /// for the same protocol.
    pub fn register(&mut self, name: impl Into<String>, factory: AdapterFactory) {
        let name = name.into();
        tracing::debug!(protocol = %name, "registering protocol factory");
        self.factories.insert(name, factory);
    }

    /// Construct an adapter for `name` from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProtocol`] when no factory is
    /// registered under `name`, or the factory's own error when the
    /// configuration does not fit.
    pub fn create(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn ProtocolAdapter>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProtocol(name.to_string()))?;
        factory(config)
    }

    /// Whether a configuration would be accepted, by dry-constructing an
    /// adapter and discarding it.
    #[must_use]
    pub fn validate_config(&self, name: &str, config: &serde_json::Value) -> bool {
        self.create(name, config).is_ok()
    }

    /// Names of all registered protocols, sorted.
    #[must_use]
    pub fn supported(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.supported())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleethub_domain::command::Command;
    use fleethub_domain::device::{Device, StateMap};
    use fleethub_domain::error::{ConnectError, SendError};

    use crate::ports::{ProtocolInfo, StateCallback};

    struct StubAdapter;

    #[async_trait]
    impl ProtocolAdapter for StubAdapter {
        fn info(&self) -> ProtocolInfo {
            ProtocolInfo {
                name: "stub",
                version: "0.0.0",
                description: "test stub",
            }
        }

        async fn connect(&self) -> Result<(), ConnectError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        fn is_connected(&self) -> bool {
            true
        }

        async fn register_device(&self, _device: &Device, _on_state: StateCallback) -> bool {
            true
        }

        async fn unregister_device(&self, _device: &Device) -> bool {
            true
        }

        async fn send_command(
            &self,
            _device: &Device,
            _command: &Command,
        ) -> Result<(), SendError> {
            Ok(())
        }

        async fn get_state(&self, _device: &Device) -> Option<StateMap> {
            None
        }

        async fn discover(&self) -> bool {
            false
        }
    }

    fn stub_factory() -> AdapterFactory {
        Box::new(|config| {
            if config.get("broken").is_some() {
                return Err(ConfigError::Invalid {
                    protocol: "stub".to_string(),
                    reason: "broken flag set".to_string(),
                });
            }
            Ok(Arc::new(StubAdapter))
        })
    }

    #[test]
    fn should_create_adapter_for_registered_protocol() {
        let mut registry = ProtocolRegistry::new();
        registry.register("stub", stub_factory());

        let adapter = registry.create("stub", &serde_json::json!({})).unwrap();
        assert_eq!(adapter.info().name, "stub");
    }

    #[test]
    fn should_return_unknown_protocol_for_unregistered_name() {
        let registry = ProtocolRegistry::new();
        let result = registry.create("zigbee", &serde_json::json!({}));
        assert!(matches!(result, Err(ConfigError::UnknownProtocol(name)) if name == "zigbee"));
    }

    #[test]
    fn should_validate_config_by_dry_construction() {
        let mut registry = ProtocolRegistry::new();
        registry.register("stub", stub_factory());

        assert!(registry.validate_config("stub", &serde_json::json!({})));
        assert!(!registry.validate_config("stub", &serde_json::json!({ "broken": true })));
        assert!(!registry.validate_config("missing", &serde_json::json!({})));
    }

    #[test]
    fn should_list_supported_protocols_sorted() {
        let mut registry = ProtocolRegistry::new();
        registry.register("virtual", stub_factory());
        registry.register("mqtt", stub_factory());

        assert_eq!(registry.supported(), vec!["mqtt", "virtual"]);
        assert!(registry.contains("mqtt"));
        assert!(!registry.contains("zigbee"));
    }

    #[test]
    fn should_replace_factory_when_registered_twice() {
        let mut registry = ProtocolRegistry::new();
        registry.register("stub", stub_factory());
        registry.register(
            "stub",
            Box::new(|_| {
                Err(ConfigError::Invalid {
                    protocol: "stub".to_string(),
                    reason: "always rejects".to_string(),
                })
            }),
        );

        assert!(registry.create("stub", &serde_json::json!({})).is_err());
        assert_eq!(registry.supported().len(), 1);
    }
}
