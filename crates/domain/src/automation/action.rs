//! Action — the effect performed when an automation fires.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::id::DeviceId;

/// Priority hint forwarded to the external notifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A single device command inside a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneCommand {
    pub device_id: DeviceId,
    pub command: Command,
}

/// An operation executed when an automation fires. Actions run strictly in
/// list order; a failure skips the remaining actions of that firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Send a command to a device through the orchestrator.
    DeviceCommand {
        device_id: DeviceId,
        command: Command,
    },
    /// A bounded list of device commands executed in the same fail-fast
    /// sequence.
    Scene {
        name: String,
        commands: Vec<SceneCommand>,
    },
    /// Delegate to the external notifier.
    Notification {
        title: String,
        message: String,
        #[serde(default)]
        priority: NotifyPriority,
    },
    /// Suspend the action sequence. Implemented as a timer continuation,
    /// never a thread-blocking sleep.
    Delay { seconds: u64 },
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceCommand { device_id, command } => {
                write!(f, "device_command({command}, {device_id})")
            }
            Self::Scene { name, commands } => {
                write!(f, "scene({name}, {} commands)", commands.len())
            }
            Self::Notification { title, .. } => write!(f, "notification({title})"),
            Self::Delay { seconds } => write!(f, "delay({seconds}s)"),
        }
    }
}
