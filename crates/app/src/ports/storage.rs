//! Storage ports — repository traits for persistence.
//!
//! Mutating operations on a single device's records (state merges, queue
//! pushes and removals) must be serialized per device by the implementation;
//! operations on distinct devices are free to run concurrently.

use std::future::Future;

use fleethub_domain::automation::Automation;
use fleethub_domain::device::{Device, StateDelta, StateMap};
use fleethub_domain::error::HubError;
use fleethub_domain::id::{AutomationId, DeviceId, QueueEntryId};
use fleethub_domain::queue::{QueueEntry, QueueEntryStatus};
use fleethub_domain::script::Script;
use fleethub_domain::time::Timestamp;

/// Repository for persisting and querying [`Device`]s.
pub trait DeviceRepository {
    /// Create a new device in storage.
    ///
    /// Fails with [`HubError::Conflict`] when a device with the same
    /// identifier is already registered.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send;

    /// Get a device by its hardware address.
    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send;

    /// Get all devices.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send;

    /// Replace an existing device record.
    ///
    /// Fails with [`HubError::NotFound`] when the device does not exist.
    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send;

    /// Delete a device. Returns whether a record was removed.
    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, HubError>> + Send;

    /// Merge a partial state into the device's state under the device's own
    /// lock and return the resulting delta. Also records liveness.
    ///
    /// Fails with [`HubError::NotFound`] when the device does not exist.
    fn apply_state(
        &self,
        id: &DeviceId,
        partial: StateMap,
        at: Timestamp,
    ) -> impl Future<Output = Result<StateDelta, HubError>> + Send;

    /// Record a liveness ping without touching state.
    fn touch(
        &self,
        id: &DeviceId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// Repository for persisting and querying [`Script`]s, keyed by
/// `(device, name)`.
pub trait ScriptRepository {
    /// Insert or replace the script with the same `(device, name)` key.
    fn upsert(&self, script: Script) -> impl Future<Output = Result<Script, HubError>> + Send;

    /// Get a script by owner and name.
    fn get(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<Option<Script>, HubError>> + Send;

    /// All scripts owned by a device, sorted by name.
    fn list_for_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<Script>, HubError>> + Send;

    /// Delete a script by owner and name. Returns whether a record was
    /// removed.
    fn delete(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<bool, HubError>> + Send;

    /// Delete every script owned by a device, returning the removed count.
    fn delete_for_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<usize, HubError>> + Send;
}

/// Repository for per-device script queues.
///
/// Positions are 0-based and dense: after any operation completes, the
/// positions of a device's entries form the contiguous range `[0, count-1]`
/// in arrival order. Every removal compacts.
pub trait QueueRepository {
    /// Append a pending entry at position `count`, atomically with respect
    /// to other pushes for the same device.
    fn push(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<QueueEntry, HubError>> + Send;

    /// All entries for a device, ordered by ascending position.
    fn list(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<QueueEntry>, HubError>> + Send;

    /// The entry at position 0, if any.
    fn head(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send;

    /// Remove the lowest-positioned entry referencing `script_name` and
    /// renumber the remainder. Returns the removed entry, or `None` when no
    /// entry matches.
    fn remove_first_by_name(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send;

    /// Remove every entry referencing `script_name` and renumber the
    /// remainder. Returns the removed count.
    fn remove_all_by_name(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<usize, HubError>> + Send;

    /// Remove a single entry by identifier and renumber the remainder.
    /// Returns the removed entry, or `None` when absent.
    fn remove_entry(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send;

    /// Update the execution status (and optional result payload) of an
    /// entry in place. Terminal statuses also stamp `executed_at`.
    fn set_status(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
        status: QueueEntryStatus,
        result: Option<String>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Drop the whole queue for a device, returning the removed count.
    fn clear_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<usize, HubError>> + Send;
}

/// Repository for persisting and querying [`Automation`]s.
pub trait AutomationRepository {
    /// Create a new automation in storage.
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HubError>> + Send;

    /// Get an automation by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HubError>> + Send;

    /// Get all automations.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, HubError>> + Send;

    /// Get all enabled automations.
    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Automation>, HubError>> + Send;

    /// Update an existing automation.
    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HubError>> + Send;

    /// Delete an automation by its unique identifier.
    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), HubError>> + Send;
}
