//! Trigger — the condition or schedule that activates an automation.

use serde::{Deserialize, Serialize};

use crate::device::StateDelta;
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Comparison operator for [`Trigger::Threshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
}

impl ThresholdOp {
    /// Apply the operator.
    #[must_use]
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
        }
    }
}

/// Describes what should activate an automation.
///
/// Condition-based variants are evaluated synchronously per state delta;
/// time-based variants are evaluated on an external polling cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires at an exact wall-clock time, `"HH:MM"`.
    At { time: String },
    /// Fires every `seconds` seconds.
    Interval { seconds: u64 },
    /// Sunrise with offset. Representable but never fires: astronomical
    /// computation is out of scope for the core.
    Sunrise { offset_secs: i64 },
    /// Sunset with offset. Representable but never fires, as above.
    Sunset { offset_secs: i64 },
    /// Edge-triggered: fires only when a state property transitions INTO
    /// the target value (old != target and new == target), never when it
    /// merely stays there.
    StateChangeTo {
        device_id: DeviceId,
        target: crate::device::StateMap,
    },
    /// Fires when a numeric property satisfies the comparison after an
    /// update (level-triggered).
    Threshold {
        device_id: DeviceId,
        property: String,
        operator: ThresholdOp,
        value: f64,
    },
}

impl Trigger {
    /// Check whether this trigger matches a state delta for `device_id`.
    ///
    /// Time-based triggers never match deltas; they are driven by
    /// [`is_due`](Self::is_due).
    #[must_use]
    pub fn matches_delta(&self, device_id: &DeviceId, delta: &StateDelta) -> bool {
        match self {
            Self::StateChangeTo {
                device_id: target_device,
                target,
            } => {
                if target_device != device_id {
                    return false;
                }
                target.iter().any(|(key, value)| {
                    delta.new.get(key) == Some(value) && delta.old.get(key) != Some(value)
                })
            }
            Self::Threshold {
                device_id: target_device,
                property,
                operator,
                value,
            } => {
                if target_device != device_id {
                    return false;
                }
                delta
                    .new
                    .get(property)
                    .and_then(serde_json::Value::as_f64)
                    .is_some_and(|observed| operator.compare(observed, *value))
            }
            Self::At { .. } | Self::Interval { .. } | Self::Sunrise { .. } | Self::Sunset { .. } => {
                false
            }
        }
    }

    /// Check whether a time-based trigger is due at `now`.
    ///
    /// `last_triggered` suppresses duplicate firings: an exact-time trigger
    /// fires at most once per minute, an interval trigger once per elapsed
    /// interval. Condition-based triggers and sunrise/sunset always return
    /// `false`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp, last_triggered: Option<Timestamp>) -> bool {
        match self {
            Self::At { time } => {
                if now.format("%H:%M").to_string() != *time {
                    return false;
                }
                // Suppress refiring within the same minute.
                !last_triggered
                    .is_some_and(|last| now.signed_duration_since(last).num_seconds() < 60)
            }
            Self::Interval { seconds } => {
                if *seconds == 0 {
                    return false;
                }
                match last_triggered {
                    None => true,
                    Some(last) => {
                        now.signed_duration_since(last).num_seconds() >= i64::try_from(*seconds).unwrap_or(i64::MAX)
                    }
                }
            }
            Self::Sunrise { .. }
            | Self::Sunset { .. }
            | Self::StateChangeTo { .. }
            | Self::Threshold { .. } => false,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::At { time } => write!(f, "at({time})"),
            Self::Interval { seconds } => write!(f, "interval({seconds}s)"),
            Self::Sunrise { offset_secs } => write!(f, "sunrise({offset_secs:+}s)"),
            Self::Sunset { offset_secs } => write!(f, "sunset({offset_secs:+}s)"),
            Self::StateChangeTo { device_id, .. } => write!(f, "state_change_to({device_id})"),
            Self::Threshold {
                device_id,
                property,
                ..
            } => write!(f, "threshold({device_id}.{property})"),
        }
    }
}
