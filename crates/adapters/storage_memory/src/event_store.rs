//! In-memory implementation of [`EventStore`].

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use fleethub_app::ports::EventStore;
use fleethub_domain::error::HubError;
use fleethub_domain::event::DeviceEvent;
use fleethub_domain::id::DeviceId;

/// Append-only event log held in memory.
///
/// The log grows without bound; callers that care should size their queries
/// with `limit` and restart the process to truncate. Good enough for a
/// single-process hub.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<RwLock<Vec<DeviceEvent>>>,
}

impl MemoryEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryEventStore {
    fn append(
        &self,
        event: DeviceEvent,
    ) -> impl Future<Output = Result<DeviceEvent, HubError>> + Send {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        async move { Ok(event) }
    }

    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send {
        let result: Vec<DeviceEvent> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect();
        async move { Ok(result) }
    }

    fn find_by_device(
        &self,
        device_id: &DeviceId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send {
        let result: Vec<DeviceEvent> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .filter(|e| &e.device_id == device_id)
            .take(limit)
            .cloned()
            .collect();
        async move { Ok(result) }
    }
}
