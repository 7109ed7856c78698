//! Command — a named payload dispatched to a device through its protocol
//! adapter.

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::device::Device;

/// A command destined for a device. The payload is free-form JSON the
/// target runtime interprets; the core only checks the name against the
/// device's declared capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command name, e.g. `"turn_on"`, `"set_color"`, `"run_script"`.
    pub name: String,
    /// Additional parameters for the command.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Command {
    /// Create a command with an empty payload.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Create a command carrying a payload.
    #[must_use]
    pub fn with_payload(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Build the dispatch command for a script body.
    #[must_use]
    pub fn run_script(script_name: &str, body: &str) -> Self {
        Self::with_payload(
            "run_script",
            serde_json::json!({ "script": script_name, "body": body }),
        )
    }

    /// Whether this command's shape is compatible with the device's
    /// declared capability set.
    #[must_use]
    pub fn is_valid_for(&self, device: &Device) -> bool {
        match Capability::required_for(&self.name) {
            Some(cap) => device.capabilities.contains(&cap),
            None => true,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
