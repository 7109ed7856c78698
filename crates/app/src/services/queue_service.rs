//! Queue service — name-addressable, dense per-device script queues.

use fleethub_domain::error::{HubError, NotFoundError};
use fleethub_domain::id::{DeviceId, QueueEntryId};
use fleethub_domain::queue::{QueueEntry, QueueEntryStatus};

use crate::ports::{DeviceRepository, QueueRepository, ScriptRepository};

/// Application service for queue management.
///
/// Positions are assigned by the queue repository under per-device
/// serialization, so concurrent enqueues for the same device always end up
/// with distinct, dense positions.
pub struct QueueService<DR, SR, QR> {
    devices: DR,
    scripts: SR,
    queue: QR,
}

impl<DR, SR, QR> QueueService<DR, SR, QR>
where
    DR: DeviceRepository,
    SR: ScriptRepository,
    QR: QueueRepository,
{
    /// Create a new service backed by the given repositories.
    pub fn new(devices: DR, scripts: SR, queue: QR) -> Self {
        Self {
            devices,
            scripts,
            queue,
        }
    }

    /// Append a pending entry for `script_name` at the end of the device's
    /// queue.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device or the referenced
    /// script does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn enqueue(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> Result<QueueEntry, HubError> {
        self.require_device(device_id).await?;
        if self.scripts.get(device_id, script_name).await?.is_none() {
            return Err(NotFoundError {
                entity: "Script",
                id: format!("{device_id}/{script_name}"),
            }
            .into());
        }
        self.queue.push(device_id, script_name).await
    }

    /// Remove the lowest-positioned entry referencing `script_name` and
    /// renumber the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device does not exist or no
    /// entry references the script.
    #[tracing::instrument(skip(self))]
    pub async fn dequeue(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> Result<QueueEntry, HubError> {
        self.require_device(device_id).await?;
        self.queue
            .remove_first_by_name(device_id, script_name)
            .await?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "QueueEntry",
                    id: format!("{device_id}/{script_name}"),
                }
                .into()
            })
    }

    /// All entries for a device, ordered by ascending position.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device does not exist.
    pub async fn entries(&self, device_id: &DeviceId) -> Result<Vec<QueueEntry>, HubError> {
        self.require_device(device_id).await?;
        self.queue.list(device_id).await
    }

    /// The entry at position 0, if any. Dispatch plumbing.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn head(&self, device_id: &DeviceId) -> Result<Option<QueueEntry>, HubError> {
        self.queue.head(device_id).await
    }

    /// Update an entry's execution status in place. Dispatch plumbing.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the entry does not exist.
    pub async fn set_status(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
        status: QueueEntryStatus,
        result: Option<String>,
    ) -> Result<(), HubError> {
        self.queue
            .set_status(device_id, entry_id, status, result)
            .await
    }

    /// Remove a single entry by identifier, renumbering the remainder.
    /// Dispatch plumbing.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn remove_entry(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
    ) -> Result<Option<QueueEntry>, HubError> {
        self.queue.remove_entry(device_id, entry_id).await
    }

    /// Drop the whole queue for a device, returning the removed count.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn clear(&self, device_id: &DeviceId) -> Result<usize, HubError> {
        self.queue.clear_device(device_id).await
    }

    async fn require_device(&self, id: &DeviceId) -> Result<(), HubError> {
        if self.devices.get_by_id(id).await?.is_none() {
            return Err(NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
