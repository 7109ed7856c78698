//! In-memory implementation of [`QueueRepository`].
//!
//! Each device's queue is a vector behind its own lock, kept in position
//! order. Every removal renumbers the survivors, so positions are always
//! the dense range `[0, count-1]`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use fleethub_app::ports::QueueRepository;
use fleethub_domain::error::{HubError, NotFoundError};
use fleethub_domain::id::{DeviceId, QueueEntryId};
use fleethub_domain::queue::{QueueEntry, QueueEntryStatus};

type Slot = Arc<Mutex<Vec<QueueEntry>>>;

/// Queue repository with one lock per device queue.
#[derive(Clone, Default)]
pub struct MemoryQueueRepository {
    inner: Arc<RwLock<HashMap<DeviceId, Slot>>>,
}

impl MemoryQueueRepository {
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

fn renumber(entries: &mut [QueueEntry]) {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index;
    }
}

impl QueueRepository for MemoryQueueRepository {
    fn push(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<QueueEntry, HubError>> + Send {
        let slot = self.slot_or_insert(device_id);
        let mut entries = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = QueueEntry::new(device_id.clone(), script_name, entries.len());
        entries.push(entry.clone());
        drop(entries);
        async move { Ok(entry) }
    }

    fn list(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<QueueEntry>, HubError>> + Send {
        let result = self.slot(device_id).map_or_else(Vec::new, |slot| {
            slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
        });
        async move { Ok(result) }
    }

    fn head(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send {
        let result = self.slot(device_id).and_then(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .first()
                .cloned()
        });
        async move { Ok(result) }
    }

    fn remove_first_by_name(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send {
        let result = self.slot(device_id).and_then(|slot| {
            let mut entries = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let index = entries.iter().position(|e| e.script_name == script_name)?;
            let removed = entries.remove(index);
            renumber(&mut entries);
            Some(removed)
        });
        async move { Ok(result) }
    }

    fn remove_all_by_name(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<usize, HubError>> + Send {
        let removed = self.slot(device_id).map_or(0, |slot| {
            let mut entries = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let before = entries.len();
            entries.retain(|e| e.script_name != script_name);
            renumber(&mut entries);
            before - entries.len()
        });
        async move { Ok(removed) }
    }

    fn remove_entry(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send {
        let result = self.slot(device_id).and_then(|slot| {
            let mut entries = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let index = entries.iter().position(|e| e.id == entry_id)?;
            let removed = entries.remove(index);
            renumber(&mut entries);
            Some(removed)
        });
        async move { Ok(result) }
    }

    fn set_status(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
        status: QueueEntryStatus,
        result: Option<String>,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let outcome = self
            .slot(device_id)
            .and_then(|slot| {
                let mut entries = slot.lock().unwrap_or_else(PoisonError::into_inner);
                let entry = entries.iter_mut().find(|e| e.id == entry_id)?;
                entry.status = status;
                entry.result = result;
                if matches!(
                    status,
                    QueueEntryStatus::Completed | QueueEntryStatus::Failed
                ) {
                    entry.executed_at = Some(fleethub_domain::time::now());
                }
                Some(())
            })
            .ok_or_else(|| {
                HubError::from(NotFoundError {
                    entity: "QueueEntry",
                    id: entry_id.to_string(),
                })
            });
        async move { outcome }
    }

    fn clear_device(
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
