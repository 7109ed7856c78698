//! In-memory implementation of [`DeviceRepository`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use fleethub_app::ports::DeviceRepository;
use fleethub_domain::device::{Device, StateDelta, StateMap};
use fleethub_domain::error::{ConflictError, HubError, NotFoundError};
use fleethub_domain::id::DeviceId;
use fleethub_domain::time::Timestamp;

type Slot = Arc<Mutex<Device>>;

/// Device repository with one lock per device.
///
/// The outer map lock is held only long enough to find or insert the
/// device's slot; state merges and liveness updates run under the slot's
/// own lock, so two devices never contend with each other.
#[derive(Clone, Default)]
pub struct MemoryDeviceRepository {
    inner: Arc<RwLock<HashMap<DeviceId, Slot>>>,
}

impl MemoryDeviceRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &DeviceId) -> Option<Slot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn not_found(id: &DeviceId) -> HubError {
        NotFoundError {
            entity: "Device",
            id: id.to_string(),
        }
        .into()
    }
}

impl DeviceRepository for MemoryDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let result = if map.contains_key(&device.id) {
            Err(ConflictError {
                entity: "Device",
                id: device.id.to_string(),
            }
            .into())
        } else {
            map.insert(device.id.clone(), Arc::new(Mutex::new(device.clone())));
            Ok(device)
        };
        async move { result }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        let result = self
            .slot(id)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone());
        async move { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send {
        let slots: Vec<Slot> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let result: Vec<Device> = slots
            .into_iter()
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        async move { Ok(result) }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send {
        let result = match self.slot(&device.id) {
            Some(slot) => {
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = device.clone();
                Ok(device)
            }
            None => Err(Self::not_found(&device.id)),
        };
        async move { result }
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, HubError>> + Send {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        async move { Ok(removed) }
    }

    fn apply_state(
        &self,
        id: &DeviceId,
        partial: StateMap,
        at: Timestamp,
    ) -> impl Future<Output = Result<StateDelta, HubError>> + Send {
        let result = match self.slot(id) {
            Some(slot) => {
                let mut device = slot.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(device.merge_state(partial, at))
            }
            None => Err(Self::not_found(id)),
        };
        async move { result }
    }

    fn touch(
        &self,
        id: &DeviceId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let result = match self.slot(id) {
            Some(slot) => {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .touch(at);
                Ok(())
            }
            None => Err(Self::not_found(id)),
        };
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleethub_domain::capability::Capability;
    use fleethub_domain::device::DeviceStatus;
    use fleethub_domain::time::now;

    fn device_id() -> DeviceId {
        DeviceId::new("AA:BB:CC:DD:EE:FF")
    }

    fn lamp() -> Device {
        Device::builder()
            .id("AA:BB:CC:DD:EE:FF")
            .name("Desk Lamp")
            .protocol("mqtt")
            .capability(Capability::OnOff)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_fetch_device() {
        let repo = MemoryDeviceRepository::new();
        repo.create(lamp()).await.unwrap();

        let fetched = repo.get_by_id(&device_id()).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Desk Lamp");
    }

    #[tokio::test]
    async fn should_reject_duplicate_create() {
        let repo = MemoryDeviceRepository::new();
        repo.create(lamp()).await.unwrap();

        let result = repo.create(lamp()).await;
        assert!(matches!(result, Err(HubError::Conflict(_))));
    }

    #[tokio::test]
    async fn should_merge_state_and_record_liveness() {
        let repo = MemoryDeviceRepository::new();
        repo.create(lamp()).await.unwrap();

        let mut partial = StateMap::new();
        partial.insert("power".to_string(), serde_json::json!("on"));
        let delta = repo.apply_state(&device_id(), partial, now()).await.unwrap();
        assert!(delta.old.get("power").is_none());
        assert_eq!(delta.new["power"], "on");

        let device = repo.get_by_id(&device_id()).await.unwrap().unwrap();
        assert!(device.last_ping.is_some());
    }

    #[tokio::test]
    async fn should_return_not_found_for_state_update_on_missing_device() {
        let repo = MemoryDeviceRepository::new();
        let result = repo.apply_state(&device_id(), StateMap::new(), now()).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_touch_device_back_online() {
        let repo = MemoryDeviceRepository::new();
        repo.create(lamp()).await.unwrap();

        repo.touch(&device_id(), now()).await.unwrap();
        let device = repo.get_by_id(&device_id()).await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn should_delete_device() {
        let repo = MemoryDeviceRepository::new();
        repo.create(lamp()).await.unwrap();

        assert!(repo.delete(&device_id()).await.unwrap());
        assert!(!repo.delete(&device_id()).await.unwrap());
        assert!(repo.get_by_id(&device_id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_serialize_concurrent_updates_to_same_device() {
        let repo = MemoryDeviceRepository::new();
        repo.create(lamp()).await.unwrap();

        let mut handles = Vec::new();
        for index in 0..10 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let mut partial = StateMap::new();
                partial.insert(format!("key_{index}"), serde_json::json!(index));
                repo.apply_state(&device_id(), partial, now()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let device = repo.get_by_id(&device_id()).await.unwrap().unwrap();
        // Every merge survived; none were lost to interleaving.
        assert_eq!(device.state.len(), 10);
    }
}
