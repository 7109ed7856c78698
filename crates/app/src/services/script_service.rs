//! Script service — upload, list, and delete per-device scripts.

use fleethub_domain::error::{HubError, NotFoundError};
use fleethub_domain::id::DeviceId;
use fleethub_domain::script::Script;

use crate::ports::{DeviceRepository, QueueRepository, ScriptRepository};

/// Application service for script management.
///
/// Deleting a script purges every queue entry that references it, so the
/// queue can never point at a script that no longer exists.
pub struct ScriptService<DR, SR, QR> {
    devices: DR,
    scripts: SR,
    queue: QR,
}

impl<DR, SR, QR> ScriptService<DR, SR, QR>
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

    /// Upload a script to a device, replacing any script with the same
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device does not exist, or
    /// [`HubError::Validation`] when the name is empty.
    #[tracing::instrument(skip(self, body))]
    pub async fn upload_script(
        &self,
        device_id: &DeviceId,
        name: &str,
        body: &str,
    ) -> Result<Script, HubError> {
        self.require_device(device_id).await?;
        let script = Script::new(device_id.clone(), name, body)?;
        self.scripts.upsert(script).await
    }

    /// Look up a script by owner and name.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no such script exists.
    pub async fn get_script(&self, device_id: &DeviceId, name: &str) -> Result<Script, HubError> {
        self.scripts
            .get(device_id, name)
            .await?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Script",
                    id: format!("{device_id}/{name}"),
                }
                .into()
            })
    }

    /// All scripts owned by a device, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device does not exist.
    pub async fn list_scripts(&self, device_id: &DeviceId) -> Result<Vec<Script>, HubError> {
        self.require_device(device_id).await?;
        self.scripts.list_for_device(device_id).await
    }

    /// Delete a script and purge every queue entry referencing it.
    ///
    /// Returns whether a script was removed. Deleting a script that does
    /// not exist is a no-op on the queue.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repositories.
    #[tracing::instrument(skip(self))]
    pub async fn delete_script(&self, device_id: &DeviceId, name: &str) -> Result<bool, HubError> {
        let deleted = self.scripts.delete(device_id, name).await?;
        if deleted {
            let purged = self.queue.remove_all_by_name(device_id, name).await?;
            if purged > 0 {
                tracing::debug!(%device_id, script = name, purged, "purged queue entries");
            }
        }
        Ok(deleted)
    }

    /// Delete every script owned by a device. Used when the device itself
    /// is removed; the caller is expected to clear the queue separately.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn delete_all_for_device(&self, device_id: &DeviceId) -> Result<usize, HubError> {
        self.scripts.delete_for_device(device_id).await
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
