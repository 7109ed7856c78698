//! Protocol adapter port — the uniform contract every transport implements.
//!
//! Adapters are held behind `Arc<dyn ProtocolAdapter>` so they can be picked
//! at runtime by protocol name, which is why this port uses `async_trait`
//! instead of the return-position `impl Future` style of the storage ports.

use std::sync::Arc;

use async_trait::async_trait;

use fleethub_domain::command::Command;
use fleethub_domain::device::{Device, StateMap};
use fleethub_domain::error::{ConnectError, SendError};
use fleethub_domain::id::DeviceId;

/// Callback invoked by an adapter when a device pushes a state update.
///
/// The callback must be cheap; adapters call it from their IO task. Heavy
/// work should be spawned by the callback itself.
pub type StateCallback = Arc<dyn Fn(DeviceId, StateMap) + Send + Sync>;

/// Static description of an adapter, for diagnostics and discovery output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// Transport-specific device IO.
///
/// One adapter instance serves every device of its protocol. Adapters own
/// their connection lifecycle: `connect` is idempotent, and a failed send
/// must leave the adapter usable for the next attempt.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Describe this adapter.
    fn info(&self) -> ProtocolInfo;

    /// Establish the transport connection. Calling this while already
    /// connected is a no-op.
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Tear down the transport connection.
    async fn disconnect(&self);

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Start listening for state updates from `device`, delivering them
    /// through `on_state`. Returns whether the registration took effect.
    async fn register_device(&self, device: &Device, on_state: StateCallback) -> bool;

    /// Stop listening for state updates from `device`. Returns whether a
    /// registration was removed.
    async fn unregister_device(&self, device: &Device) -> bool;

    /// Deliver a command to the device.
    async fn send_command(&self, device: &Device, command: &Command) -> Result<(), SendError>;

    /// Query the device's current state, if the transport supports reads.
    async fn get_state(&self, device: &Device) -> Option<StateMap>;

    /// Kick off device discovery. Returns whether discovery was initiated.
    async fn discover(&self) -> bool;

    /// Whether this adapter would accept the command for the device.
    ///
    /// The default checks the command against the device's declared
    /// capabilities; adapters may tighten this further.
    fn validate_command(&self, device: &Device, command: &Command) -> bool {
        command.is_valid_for(device)
    }
}
