//! In-memory implementation of [`ScriptRepository`].

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use fleethub_app::ports::ScriptRepository;
use fleethub_domain::error::HubError;
use fleethub_domain::id::DeviceId;
use fleethub_domain::script::Script;

type Slot = Arc<Mutex<BTreeMap<String, Script>>>;

/// Script repository with one lock per device. Scripts are stored keyed by
/// name, so uploads upsert and listings come out name-sorted.
#[derive(Clone, Default)]
pub struct MemoryScriptRepository {
    inner: Arc<RwLock<HashMap<DeviceId, Slot>>>,
}

impl MemoryScriptRepository {
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

    fn slot_or_insert(&self, id: &DeviceId) -> Slot {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_default()
            .clone()
    }
}

impl ScriptRepository for MemoryScriptRepository {
    fn upsert(&self, script: Script) -> impl Future<Output = Result<Script, HubError>> + Send {
        let slot = self.slot_or_insert(&script.device_id);
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(script.name.clone(), script.clone());
        async move { Ok(script) }
    }

    fn get(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<Option<Script>, HubError>> + Send {
        let result = self.slot(device_id).and_then(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned()
        });
        async move { Ok(result) }
    }

    fn list_for_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<Script>, HubError>> + Send {
        let result = self.slot(device_id).map_or_else(Vec::new, |slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .cloned()
                .collect()
        });
        async move { Ok(result) }
    }

    fn delete(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<bool, HubError>> + Send {
        let removed = self.slot(device_id).is_some_and(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(name)
                .is_some()
        });
        async move { Ok(removed) }
    }

    fn delete_for_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<usize, HubError>> + Send {
        let removed = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id)
            .map_or(0, |slot| {
                slot.lock().unwrap_or_else(PoisonError::into_inner).len()
            });
        async move { Ok(removed) }
    }
}
