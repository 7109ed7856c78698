//! # fleethub-adapter-mqtt
//!
//! MQTT transport adapter. One adapter instance serves every MQTT device,
//! multiplexed over a single broker connection.
//!
//! ## Topic scheme
//!
//! | Topic | Direction | Payload |
//! |-------|-----------|---------|
//! | `<base>/<device_id>/state` | device → hub | partial state JSON object |
//! | `<base>/<device_id>/command` | hub → device | `{"command": …, "payload": …}` |
//! | `<base>/discovery` | hub → devices | `{}` broadcast |
//!
//! The rumqttc event loop reconnects on unexpected disconnects; the pump
//! task re-subscribes every registered device when the broker acknowledges a
//! new session.
//!
//! ## Dependency rule
//!
//! Depends on `fleethub-app` (port traits) and `fleethub-domain` only.

pub mod config;
pub mod error;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;

use fleethub_app::ports::{ProtocolAdapter, ProtocolInfo, StateCallback};
use fleethub_app::registry::AdapterFactory;
use fleethub_domain::command::Command;
use fleethub_domain::device::{Device, StateMap};
use fleethub_domain::error::{ConnectError, SendError};
use fleethub_domain::id::DeviceId;

pub use config::MqttConfig;
pub use error::MqttError;

type Routes = Arc<RwLock<HashMap<DeviceId, StateCallback>>>;

struct Connection {
    client: AsyncClient,
    pump: JoinHandle<()>,
}

/// MQTT implementation of [`ProtocolAdapter`].
pub struct MqttAdapter {
    config: MqttConfig,
    connection: Mutex<Option<Connection>>,
    routes: Routes,
}

impl MqttAdapter {
    /// Create a disconnected adapter from its configuration.
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
            routes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Factory closure for the protocol registry.
    #[must_use]
    pub fn factory() -> AdapterFactory {
        Box::new(|value| {
            let config = MqttConfig::from_value(value)?;
            Ok(Arc::new(MqttAdapter::new(config)) as Arc<dyn ProtocolAdapter>)
        })
    }

    fn client(&self) -> Option<AsyncClient> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|conn| conn.client.clone())
    }

    fn state_topic(&self, device_id: &DeviceId) -> String {
        format!("{}/{}/state", self.config.base_topic, device_id.as_str())
    }

    fn command_topic(&self, device_id: &DeviceId) -> String {
        format!("{}/{}/command", self.config.base_topic, device_id.as_str())
    }

    fn discovery_topic(&self) -> String {
        format!("{}/discovery", self.config.base_topic)
    }
}

/// Extract the device id from a `<base>/<device_id>/state` topic.
fn parse_state_topic(base: &str, topic: &str) -> Option<DeviceId> {
    let rest = topic.strip_prefix(base)?.strip_prefix('/')?;
    let id = rest.strip_suffix("/state")?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(DeviceId::new(id))
}

/// Route an incoming state publish to the registered callback, if any.
fn dispatch_state(base: &str, routes: &Routes, topic: &str, payload: &[u8]) {
    let Some(device_id) = parse_state_topic(base, topic) else {
        return;
    };
    let callback = routes
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&device_id)
        .cloned();
    let Some(callback) = callback else {
        tracing::debug!(device_id = device_id.as_str(), "state for unregistered device");
        return;
    };
    match serde_json::from_slice::<StateMap>(payload) {
        Ok(state) => callback(device_id, state),
        Err(err) => {
            tracing::warn!(
                device_id = device_id.as_str(),
                error = %MqttError::PayloadParse(err),
                "dropping unparseable state payload"
            );
        }
    }
}

async fn resubscribe(client: &AsyncClient, base: &str, routes: &Routes) {
    let device_ids: Vec<DeviceId> = routes
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    for device_id in device_ids {
        let topic = format!("{base}/{}/state", device_id.as_str());
        if let Err(err) = client.subscribe(topic, QoS::AtLeastOnce).await {
            tracing::warn!(
                device_id = device_id.as_str(),
                error = %MqttError::Client(err),
                "failed to re-subscribe after reconnect"
            );
        }
    }
}

async fn run_event_loop(client: AsyncClient, mut event_loop: EventLoop, base: String, routes: Routes) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("MQTT session (re)established");
                resubscribe(&client, &base, &routes).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                dispatch_state(&base, &routes, &publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "MQTT connection error, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl ProtocolAdapter for MqttAdapter {
    fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            name: "mqtt",
            version: env!("CARGO_PKG_VERSION"),
            description: "MQTT broker transport via rumqttc",
        }
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        if self.is_connected() {
            return Ok(());
        }

        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.broker_host.clone(),
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(self.config.keep_alive_secs)));
        let (client, mut event_loop) = AsyncClient::new(options, 64);

        // The first poll drives the TCP connect and yields the broker's ack.
        let timeout = Duration::from_secs(u64::from(self.config.connect_timeout_secs));
        match tokio::time::timeout(timeout, event_loop.poll()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                return Err(ConnectError {
                    protocol: "mqtt".to_string(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                return Err(ConnectError {
                    protocol: "mqtt".to_string(),
                    reason: format!(
                        "broker did not answer within {}s",
                        self.config.connect_timeout_secs
                    ),
                });
            }
        }

        let pump = tokio::spawn(run_event_loop(
            client.clone(),
            event_loop,
            self.config.base_topic.clone(),
            Arc::clone(&self.routes),
        ));

        let mut guard = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.replace(Connection { client, pump }) {
            old.pump.abort();
        }
        Ok(())
    }

    async fn disconnect(&self) {
        let taken = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(conn) = taken {
            if let Err(err) = conn.client.disconnect().await {
                tracing::debug!(error = %MqttError::Client(err), "error on MQTT disconnect");
            }
            conn.pump.abort();
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn register_device(&self, device: &Device, on_state: StateCallback) -> bool {
        let Some(client) = self.client() else {
            tracing::warn!(
                device_id = device.id.as_str(),
                "cannot register device while disconnected"
            );
            return false;
        };
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device.id.clone(), on_state);
        if let Err(err) = client
            .subscribe(self.state_topic(&device.id), QoS::AtLeastOnce)
            .await
        {
            tracing::warn!(
                device_id = device.id.as_str(),
                error = %MqttError::Client(err),
                "failed to subscribe to device state topic"
            );
            self.routes
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&device.id);
            return false;
        }
        true
    }

    async fn unregister_device(&self, device: &Device) -> bool {
        let removed = self
            .routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&device.id)
            .is_some();
        if removed {
            if let Some(client) = self.client() {
                if let Err(err) = client.unsubscribe(self.state_topic(&device.id)).await {
                    tracing::debug!(
                        device_id = device.id.as_str(),
                        error = %MqttError::Client(err),
                        "failed to unsubscribe from device state topic"
                    );
                }
            }
        }
        removed
    }

    async fn send_command(&self, device: &Device, command: &Command) -> Result<(), SendError> {
        let Some(client) = self.client() else {
            return Err(SendError::Unreachable(
                MqttError::NotConnected.to_string(),
            ));
        };
        let body = serde_json::json!({
            "command": command.name,
            "payload": command.payload,
        });
        let payload =
            serde_json::to_vec(&body).map_err(|err| SendError::Rejected(err.to_string()))?;
        client
            .publish(
                self.command_topic(&device.id),
                QoS::AtLeastOnce,
                false,
                payload,
            )
            .await
            .map_err(|err| SendError::Unreachable(err.to_string()))
    }

    async fn get_state(&self, _device: &Device) -> Option<StateMap> {
        // MQTT is push-based: state arrives on the state topic.
        None
    }

    async fn discover(&self) -> bool {
        let Some(client) = self.client() else {
            return false;
        };
        match client
            .publish(self.discovery_topic(), QoS::AtLeastOnce, false, "{}")
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    error = %MqttError::Client(err),
                    "failed to publish discovery broadcast"
                );
                false
            }
        }
    }
}

/// Register the MQTT adapter factory under the `"mqtt"` protocol name.
pub fn register(registry: &mut fleethub_app::registry::ProtocolRegistry) {
    registry.register("mqtt", MqttAdapter::factory());
}
