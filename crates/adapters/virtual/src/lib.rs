//! # fleethub-adapter-virtual
//!
//! Loopback adapter that simulates devices in memory. Every command is
//! applied to a simulated state map and echoed straight back through the
//! device's state callback, so the full round trip — command out, state
//! update in — can be exercised without any transport.
//!
//! ## Simulated behaviour
//!
//! | Command | Echoed state |
//! |---------|--------------|
//! | `turn_on` / `turn_off` | `power` = `"on"` / `"off"` |
//! | `toggle` | `power` flipped |
//! | `set_brightness` | `brightness` = payload `level` |
//! | `set_color` | `color` = payload `color` |
//! | `run_script` | `last_script` = payload `script` |
//! | anything else | `last_command` = command name |
//!
//! ## Dependency rule
//!
//! Depends on `fleethub-app` (port traits) and `fleethub-domain` only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use fleethub_app::ports::{ProtocolAdapter, ProtocolInfo, StateCallback};
use fleethub_app::registry::AdapterFactory;
use fleethub_domain::command::Command;
use fleethub_domain::device::{Device, StateMap};
use fleethub_domain::error::{ConnectError, SendError};
use fleethub_domain::id::DeviceId;

#[derive(Default)]
struct SimulatedDevice {
    state: StateMap,
    on_state: Option<StateCallback>,
}

/// Loopback implementation of [`ProtocolAdapter`].
#[derive(Default)]
pub struct VirtualAdapter {
    connected: AtomicBool,
    devices: Arc<RwLock<HashMap<DeviceId, SimulatedDevice>>>,
}

impl VirtualAdapter {
    /// Create a disconnected adapter with no simulated devices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory closure for the protocol registry. The configuration payload
    /// is ignored; the virtual adapter has nothing to configure.
    #[must_use]
    pub fn factory() -> AdapterFactory {
        Box::new(|_| Ok(Arc::new(VirtualAdapter::new()) as Arc<dyn ProtocolAdapter>))
    }

    /// Compute the state fragment a simulated device reports after `command`.
    fn echo_state(current: &StateMap, command: &Command) -> StateMap {
        let mut echo = StateMap::new();
        match command.name.as_str() {
            "turn_on" => {
                echo.insert("power".to_string(), serde_json::json!("on"));
            }
            "turn_off" => {
                echo.insert("power".to_string(), serde_json::json!("off"));
            }
            "toggle" => {
                let flipped = if current.get("power") == Some(&serde_json::json!("on")) {
                    "off"
                } else {
                    "on"
                };
                echo.insert("power".to_string(), serde_json::json!(flipped));
            }
            "set_brightness" => {
                echo.insert(
                    "brightness".to_string(),
                    command.payload.get("level").cloned().unwrap_or_default(),
                );
            }
            "set_color" => {
                echo.insert(
                    "color".to_string(),
                    command.payload.get("color").cloned().unwrap_or_default(),
                );
            }
            "run_script" => {
                echo.insert(
                    "last_script".to_string(),
                    command.payload.get("script").cloned().unwrap_or_default(),
                );
            }
            other => {
                echo.insert("last_command".to_string(), serde_json::json!(other));
            }
        }
        echo
    }
}

/// Register the virtual adapter factory under the `"virtual"` protocol name.
pub fn register(registry: &mut fleethub_app::registry::ProtocolRegistry) {
    registry.register("virtual", VirtualAdapter::factory());
}

#[async_trait]
impl ProtocolAdapter for VirtualAdapter {
    fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            name: "virtual",
            version: env!("CARGO_PKG_VERSION"),
            description: "simulated loopback devices",
        }
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        tracing::debug!("virtual adapter connected");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        tracing::debug!("virtual adapter disconnected");
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn register_device(&self, device: &Device, on_state: StateCallback) -> bool {
        tracing::debug!(device_id = device.id.as_str(), "simulating device");
        let mut devices = self
            .devices
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let simulated = devices.entry(device.id.clone()).or_default();
        simulated.on_state = Some(on_state);
        true
    }

    async fn unregister_device(&self, device: &Device) -> bool {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&device.id)
            .is_some()
    }

    async fn send_command(&self, device: &Device, command: &Command) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::Unreachable(
                "virtual adapter not connected".to_string(),
            ));
        }
        let callback = {
            let mut devices = self
                .devices
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(simulated) = devices.get_mut(&device.id) else {
                return Err(SendError::Rejected(format!(
                    "device not registered: {}",
                    device.id.as_str()
                )));
            };
            let echo = Self::echo_state(&simulated.state, command);
            for (key, value) in &echo {
                simulated.state.insert(key.clone(), value.clone());
            }
            simulated.on_state.clone().map(|cb| (cb, echo))
        };
        if let Some((callback, echo)) = callback {
            tracing::trace!(
                device_id = device.id.as_str(),
                command = %command.name,
                "echoing simulated state"
            );
            callback(device.id.clone(), echo);
        }
        Ok(())
    }

    async fn get_state(&self, device: &Device) -> Option<StateMap> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device.id)
            .map(|simulated| simulated.state.clone())
    }

    async fn discover(&self) -> bool {
        self.is_connected()
    }
}
