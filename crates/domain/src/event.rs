//! Device event — an immutable, append-only audit record.

use serde::{Deserialize, Serialize};

use crate::device::StateMap;
use crate::id::{DeviceId, EventId};
use crate::time::Timestamp;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StateChange,
    CommandSent,
    AutomationTriggered,
    Error,
}

/// An immutable record of something that happened to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub id: EventId,
    pub device_id: DeviceId,
    pub kind: EventKind,
    pub old_state: Option<StateMap>,
    pub new_state: Option<StateMap>,
    pub message: Option<String>,
    pub at: Timestamp,
}

impl DeviceEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(device_id: DeviceId, kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            device_id,
            kind,
            old_state: None,
            new_state: None,
            message: None,
            at: crate::time::now(),
        }
    }

    /// Attach old/new state snapshots.
    #[must_use]
    pub fn with_states(mut self, old: StateMap, new: StateMap) -> Self {
        self.old_state = Some(old);
        self.new_state = Some(new);
        self
    }

    /// Attach a free-text message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
