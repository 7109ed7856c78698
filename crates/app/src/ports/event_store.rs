//! Event store port — persistence for device events.

use std::future::Future;

use fleethub_domain::error::HubError;
use fleethub_domain::event::DeviceEvent;
use fleethub_domain::id::DeviceId;

/// Append-only repository for [`DeviceEvent`]s.
pub trait EventStore {
    /// Persist a new event.
    fn append(&self, event: DeviceEvent)
    -> impl Future<Output = Result<DeviceEvent, HubError>> + Send;

    /// Get the most recent events, ordered newest-first.
    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send;

    /// Find events for a specific device, ordered newest-first.
    fn find_by_device(
        &self,
        device_id: &DeviceId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send;
}

impl<T: EventStore + Send + Sync> EventStore for std::sync::Arc<T> {
    fn append(
        &self,
        event: DeviceEvent,
    ) -> impl Future<Output = Result<DeviceEvent, HubError>> + Send {
        (**self).append(event)
    }

    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send {
        (**self).get_recent(limit)
    }

    fn find_by_device(
        &self,
        device_id: &DeviceId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send {
        (**self).find_by_device(device_id, limit)
    }
}
