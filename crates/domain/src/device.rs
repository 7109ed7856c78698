//! Device — a registered remote endpoint with a stable identifier,
//! capability set, and observed state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::{HubError, ValidationError};
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Free-form key → value device state. The schema is not enforced by the
/// core; merges overwrite key-wise (no deep merge).
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// The (old, new) state pair produced by a state update, used by the
/// automation engine to detect transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub old: StateMap,
    pub new: StateMap,
}

/// Reported device status. `Offline` is also derived lazily from liveness,
/// see [`Device::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

/// A remote device tracked by the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Stable hardware address. Immutable after registration.
    pub id: DeviceId,
    pub name: String,
    /// Icon or emoji tag shown by surrounding UIs.
    pub icon: String,
    pub capabilities: BTreeSet<Capability>,
    pub state: StateMap,
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Name of the transport protocol this device speaks (e.g. `"mqtt"`).
    pub protocol: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub network_address: Option<String>,
    /// Last time the device was heard from.
    pub last_ping: Option<Timestamp>,
    pub status: DeviceStatus,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when:
    /// - the identifier is empty ([`ValidationError::EmptyDeviceId`])
    /// - the identifier is not a hardware address
    ///   ([`ValidationError::InvalidHardwareAddress`])
    /// - `name` is empty ([`ValidationError::EmptyName`])
    pub fn validate(&self) -> Result<(), HubError> {
        if self.id.as_str().is_empty() {
            return Err(ValidationError::EmptyDeviceId.into());
        }
        if !self.id.is_mac_address() {
            return Err(ValidationError::InvalidHardwareAddress(self.id.to_string()).into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Merge `partial` into the current state (key-wise overwrite) and
    /// return the resulting delta. A state update is proof of life: it
    /// refreshes the liveness timestamp and brings an offline device back
    /// online.
    pub fn merge_state(&mut self, partial: StateMap, at: Timestamp) -> StateDelta {
        let old = self.state.clone();
        for (key, value) in partial {
            self.state.insert(key, value);
        }
        self.touch(at);
        StateDelta {
            old,
            new: self.state.clone(),
        }
    }

    /// Record a liveness ping without altering state.
    pub fn touch(&mut self, at: Timestamp) {
        self.last_ping = Some(at);
        if self.status == DeviceStatus::Offline {
            self.status = DeviceStatus::Online;
        }
    }

    /// The advisory status, computed lazily on read: a device whose last
    /// ping is older than `offline_after` reads as offline. There is no
    /// background sweep.
    #[must_use]
    pub fn effective_status(&self, now: Timestamp, offline_after: chrono::Duration) -> DeviceStatus {
        if self.status == DeviceStatus::Error {
            return DeviceStatus::Error;
        }
        match self.last_ping {
            Some(ping) if now - ping <= offline_after => self.status,
            _ => DeviceStatus::Offline,
        }
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    icon: Option<String>,
    capabilities: BTreeSet<Capability>,
    state: StateMap,
    config: serde_json::Map<String, serde_json::Value>,
    protocol: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    firmware_version: Option<String>,
    network_address: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn state(mut self, state: StateMap) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn config(mut self, config: serde_json::Map<String, serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn network_address(mut self, addr: impl Into<String>) -> Self {
        self.network_address = Some(addr.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// New devices start `offline` with no liveness timestamp; the first
    /// ping or state update brings them online.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if required fields are missing or
    /// malformed.
    pub fn build(self) -> Result<Device, HubError> {
        let device = Device {
            id: self.id.unwrap_or_else(|| DeviceId::new("")),
            name: self.name.unwrap_or_default(),
            icon: self.icon.unwrap_or_default(),
            capabilities: self.capabilities,
            state: self.state,
            config: self.config,
            protocol: self.protocol.unwrap_or_default(),
            manufacturer: self.manufacturer,
            model: self.model,
            firmware_version: self.firmware_version,
            network_address: self.network_address,
            last_ping: None,
            status: DeviceStatus::Offline,
        };
        device.validate()?;
        Ok(device)
    }
}
