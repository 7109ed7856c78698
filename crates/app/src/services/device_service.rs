//! Device service — use-cases for the device registry and its state.

use fleethub_domain::device::{Device, DeviceStatus, StateDelta, StateMap};
use fleethub_domain::error::{HubError, NotFoundError};
use fleethub_domain::event::{DeviceEvent, EventKind};
use fleethub_domain::id::DeviceId;
use fleethub_domain::time::now;

use crate::ports::{DeviceRepository, EventPublisher, EventStore};

/// Optional predicates for listing devices. An empty filter matches all.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub protocol: Option<String>,
    pub status: Option<DeviceStatus>,
}

impl DeviceFilter {
    fn matches(&self, device: &Device) -> bool {
        self.protocol
            .as_ref()
            .is_none_or(|protocol| &device.protocol == protocol)
            && self.status.is_none_or(|status| device.status == status)
    }
}

/// Application service for device registration, lookup, and state updates.
///
/// Reads report the *effective* status: a device whose last ping is older
/// than `offline_after` reads as offline without any background sweep.
pub struct DeviceService<R, ES, P> {
    repo: R,
    event_store: ES,
    publisher: P,
    offline_after: chrono::Duration,
}

impl<R, ES, P> DeviceService<R, ES, P>
where
    R: DeviceRepository,
    ES: EventStore,
    P: EventPublisher,
{
    /// Create a new service backed by the given repository.
    pub fn new(repo: R, event_store: ES, publisher: P, offline_after: chrono::Duration) -> Self {
        Self {
            repo,
            event_store,
            publisher,
            offline_after,
        }
    }

    /// Register a new device after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if invariants fail,
    /// [`HubError::Conflict`] when the hardware address is already
    /// registered, or a storage error from the repository.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id))]
    pub async fn register_device(&self, device: Device) -> Result<Device, HubError> {
        device.validate()?;
        self.repo.create(device).await
    }

    /// Look up a device by id, with the effective status applied.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when no device with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_device(&self, id: &DeviceId) -> Result<Device, HubError> {
        let mut device = self.repo.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Device",
            id: id.to_string(),
        })?;
        device.status = device.effective_status(now(), self.offline_after);
        Ok(device)
    }

    /// List devices matching `filter`, sorted by id, with effective
    /// statuses applied (filtering sees the derived status, not the stored
    /// one).
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, HubError> {
        let at = now();
        let mut devices = self.repo.get_all().await?;
        for device in &mut devices {
            device.status = device.effective_status(at, self.offline_after);
        }
        devices.retain(|device| filter.matches(device));
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    /// Delete a device record. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_device(&self, id: &DeviceId) -> Result<bool, HubError> {
        self.repo.delete(id).await
    }

    /// Merge a partial state update into the device's state.
    ///
    /// The state-change event is appended to the event store and published
    /// on the bus *before* this returns, so consecutive updates observe
    /// events in delta order. Also counts as a liveness ping.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device does not exist, or a
    /// storage error from the repository or event store.
    #[tracing::instrument(skip(self, partial))]
    pub async fn apply_state_update(
        &self,
        id: &DeviceId,
        partial: StateMap,
    ) -> Result<StateDelta, HubError> {
        let delta = self.repo.apply_state(id, partial, now()).await?;
        let event = DeviceEvent::new(id.clone(), EventKind::StateChange)
            .with_states(delta.old.clone(), delta.new.clone());
        self.event_store.append(event.clone()).await?;
        self.publisher.publish(event).await?;
        Ok(delta)
    }

    /// Record a liveness ping without touching state.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device does not exist.
    pub async fn record_ping(&self, id: &DeviceId) -> Result<(), HubError> {
        self.repo.touch(id, now()).await
    }
}
