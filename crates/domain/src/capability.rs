//! Device capabilities — the fixed enumeration of features a device may
//! declare, gating which commands are valid for it.

use serde::{Deserialize, Serialize};

/// A feature a device declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    OnOff,
    Brightness,
    Color,
    Temperature,
    Humidity,
    Motion,
    LockUnlock,
    VideoStream,
    CustomScript,
}

impl Capability {
    /// The capability required to accept a command with the given name,
    /// or `None` when the command is not capability-gated.
    ///
    /// Unknown command names (including `run_script`, whose body is
    /// interpreted by the target runtime, never by the core) are not gated.
    #[must_use]
    pub fn required_for(command: &str) -> Option<Self> {
        match command {
            "turn_on" | "turn_off" | "toggle" => Some(Self::OnOff),
            "set_brightness" => Some(Self::Brightness),
            "set_color" => Some(Self::Color),
            "set_temperature" => Some(Self::Temperature),
            "lock" | "unlock" => Some(Self::LockUnlock),
            "start_stream" | "stop_stream" => Some(Self::VideoStream),
            _ => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OnOff => "on_off",
            Self::Brightness => "brightness",
            Self::Color => "color",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Motion => "motion",
            Self::LockUnlock => "lock_unlock",
            Self::VideoStream => "video_stream",
            Self::CustomScript => "custom_script",
        };
        f.write_str(name)
    }
}
