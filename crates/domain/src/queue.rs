//! Queue entry — a positioned reference to a script awaiting dispatch.
//!
//! Positions are 0-based and dense: for a given device the set of positions
//! is always the contiguous range `[0, count-1]`. The renumbering that keeps
//! this invariant lives in the queue repository, whose remove operations are
//! defined to always compact.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, QueueEntryId};
use crate::time::Timestamp;

/// Execution status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A pending (script-reference) entry in a device's command queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub device_id: DeviceId,
    /// Name of the referenced script. The queue API is name-addressable.
    pub script_name: String,
    /// 0-based position, dense per device.
    pub position: usize,
    pub status: QueueEntryStatus,
    /// Result payload reported after execution, if any.
    pub result: Option<String>,
    pub scheduled_at: Option<Timestamp>,
    pub executed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl QueueEntry {
    /// Create a pending entry at the given position.
    #[must_use]
    pub fn new(device_id: DeviceId, script_name: impl Into<String>, position: usize) -> Self {
        Self {
            id: QueueEntryId::new(),
            device_id,
            script_name: script_name.into(),
            position,
            status: QueueEntryStatus::Pending,
            result: None,
            scheduled_at: None,
            executed_at: None,
            created_at: crate::time::now(),
        }
    }
}
