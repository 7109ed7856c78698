//! Shared in-memory doubles for the use-case tests.
//!
//! All doubles clone cheaply by sharing their backing map through an `Arc`,
//! so a test can hand the same store to several services and then inspect it
//! directly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use fleethub_domain::automation::{Automation, NotifyPriority};
use fleethub_domain::command::Command;
use fleethub_domain::device::{Device, StateDelta, StateMap};
use fleethub_domain::error::{
    ConflictError, ConnectError, HubError, NotFoundError, SendError,
};
use fleethub_domain::event::DeviceEvent;
use fleethub_domain::id::{AutomationId, DeviceId, QueueEntryId};
use fleethub_domain::queue::{QueueEntry, QueueEntryStatus};
use fleethub_domain::script::Script;
use fleethub_domain::time::Timestamp;

use crate::ports::{
    AutomationRepository, CommandSink, DeviceRepository, EventPublisher, EventStore, Notifier,
    ProtocolAdapter, ProtocolInfo, QueueRepository, ScriptRepository, StateCallback,
};

#[derive(Clone, Default)]
pub(crate) struct InMemoryDeviceRepo {
    store: Arc<Mutex<HashMap<DeviceId, Device>>>,
}

impl DeviceRepository for InMemoryDeviceRepo {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = if store.contains_key(&device.id) {
            Err(ConflictError {
                entity: "Device",
                id: device.id.to_string(),
            }
            .into())
        } else {
            store.insert(device.id.clone(), device.clone());
            Ok(device)
        };
        async move { result }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.get(id).cloned();
        async move { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let result: Vec<Device> = store.values().cloned().collect();
        async move { Ok(result) }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = if store.contains_key(&device.id) {
            store.insert(device.id.clone(), device.clone());
            Ok(device)
        } else {
            Err(NotFoundError {
                entity: "Device",
                id: device.id.to_string(),
            }
            .into())
        };
        async move { result }
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let removed = store.remove(id).is_some();
        async move { Ok(removed) }
    }

    fn apply_state(
        &self,
        id: &DeviceId,
        partial: StateMap,
        at: Timestamp,
    ) -> impl Future<Output = Result<StateDelta, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = match store.get_mut(id) {
            Some(device) => Ok(device.merge_state(partial, at)),
            None => Err(NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()),
        };
        async move { result }
    }

    fn touch(
        &self,
        id: &DeviceId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = match store.get_mut(id) {
            Some(device) => {
                device.touch(at);
                Ok(())
            }
            None => Err(NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()),
        };
        async move { result }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryScriptRepo {
    store: Arc<Mutex<HashMap<(DeviceId, String), Script>>>,
}

impl ScriptRepository for InMemoryScriptRepo {
    fn upsert(&self, script: Script) -> impl Future<Output = Result<Script, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.insert(
            (script.device_id.clone(), script.name.clone()),
            script.clone(),
        );
        async move { Ok(script) }
    }

    fn get(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<Option<Script>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.get(&(device_id.clone(), name.to_string())).cloned();
        async move { Ok(result) }
    }

    fn list_for_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<Script>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let mut result: Vec<Script> = store
            .values()
            .filter(|s| &s.device_id == device_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async move { Ok(result) }
    }

    fn delete(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> impl Future<Output = Result<bool, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let removed = store
            .remove(&(device_id.clone(), name.to_string()))
            .is_some();
        async move { Ok(removed) }
    }

    fn delete_for_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<usize, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let before = store.len();
        store.retain(|(owner, _), _| owner != device_id);
        let removed = before - store.len();
        async move { Ok(removed) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryQueueRepo {
    store: Arc<Mutex<HashMap<DeviceId, Vec<QueueEntry>>>>,
}

fn renumber(entries: &mut [QueueEntry]) {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index;
    }
}

impl QueueRepository for InMemoryQueueRepo {
    fn push(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<QueueEntry, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let entries = store.entry(device_id.clone()).or_default();
        let entry = QueueEntry::new(device_id.clone(), script_name, entries.len());
        entries.push(entry.clone());
        async move { Ok(entry) }
    }

    fn list(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<QueueEntry>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.get(device_id).cloned().unwrap_or_default();
        async move { Ok(result) }
    }

    fn head(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.get(device_id).and_then(|e| e.first().cloned());
        async move { Ok(result) }
    }

    fn remove_first_by_name(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = store.get_mut(device_id).and_then(|entries| {
            let index = entries.iter().position(|e| e.script_name == script_name)?;
            let removed = entries.remove(index);
            renumber(entries);
            Some(removed)
        });
        async move { Ok(result) }
    }

    fn remove_all_by_name(
        &self,
        device_id: &DeviceId,
        script_name: &str,
    ) -> impl Future<Output = Result<usize, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let removed = store.get_mut(device_id).map_or(0, |entries| {
            let before = entries.len();
            entries.retain(|e| e.script_name != script_name);
            renumber(entries);
            before - entries.len()
        });
        async move { Ok(removed) }
    }

    fn remove_entry(
        &self,
        device_id: &DeviceId,
        entry_id: QueueEntryId,
    ) -> impl Future<Output = Result<Option<QueueEntry>, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = store.get_mut(device_id).and_then(|entries| {
            let index = entries.iter().position(|e| e.id == entry_id)?;
            let removed = entries.remove(index);
            renumber(entries);
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
        let mut store = self.store.lock().unwrap();
        let outcome = store
            .get_mut(device_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == entry_id))
            .map_or_else(
                || {
                    Err(NotFoundError {
                        entity: "QueueEntry",
                        id: entry_id.to_string(),
                    }
                    .into())
                },
                |entry| {
                    entry.status = status;
                    entry.result = result;
                    if matches!(
                        status,
                        QueueEntryStatus::Completed | QueueEntryStatus::Failed
                    ) {
                        entry.executed_at = Some(fleethub_domain::time::now());
                    }
                    Ok(())
                },
            );
        async move { outcome }
    }

    fn clear_device(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<usize, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let removed = store.remove(device_id).map_or(0, |entries| entries.len());
        async move { Ok(removed) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryAutomationRepo {
    store: Arc<Mutex<HashMap<AutomationId, Automation>>>,
}

impl AutomationRepository for InMemoryAutomationRepo {
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.insert(automation.id, automation.clone());
        async move { Ok(automation) }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let result = store.get(&id).cloned();
        async move { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let mut result: Vec<Automation> = store.values().cloned().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async move { Ok(result) }
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Automation>, HubError>> + Send {
        let store = self.store.lock().unwrap();
        let mut result: Vec<Automation> = store.values().filter(|a| a.enabled).cloned().collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async move { Ok(result) }
    }

    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.insert(automation.id, automation.clone());
        async move { Ok(automation) }
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), HubError>> + Send {
        let mut store = self.store.lock().unwrap();
        store.remove(&id);
        async move { Ok(()) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct CapturingEventStore {
    pub events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl EventStore for CapturingEventStore {
    fn append(
        &self,
        event: DeviceEvent,
    ) -> impl Future<Output = Result<DeviceEvent, HubError>> + Send {
        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        async move { Ok(event) }
    }

    fn get_recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send {
        let events = self.events.lock().unwrap();
        let result: Vec<DeviceEvent> = events.iter().rev().take(limit).cloned().collect();
        async move { Ok(result) }
    }

    fn find_by_device(
        &self,
        device_id: &DeviceId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DeviceEvent>, HubError>> + Send {
        let events = self.events.lock().unwrap();
        let result: Vec<DeviceEvent> = events
            .iter()
            .rev()
            .filter(|e| &e.device_id == device_id)
            .take(limit)
            .cloned()
            .collect();
        async move { Ok(result) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct CapturingPublisher {
    pub events: Arc<Mutex<Vec<DeviceEvent>>>,
}

impl EventPublisher for CapturingPublisher {
    fn publish(&self, event: DeviceEvent) -> impl Future<Output = Result<(), HubError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<(String, String, NotifyPriority)>>>,
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        title: &str,
        message: &str,
        priority: NotifyPriority,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), priority));
        async { Ok(()) }
    }
}

/// Command sink that records submissions and can be told to reject one
/// command name.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    pub sent: Arc<Mutex<Vec<(DeviceId, Command)>>>,
    pub reject_name: Arc<Mutex<Option<String>>>,
}

impl CommandSink for RecordingSink {
    fn submit_command(
        &self,
        device_id: &DeviceId,
        command: Command,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        let rejected = self.reject_name.lock().unwrap().as_deref() == Some(command.name.as_str());
        let result = if rejected {
            Err(HubError::Send(SendError::Rejected(format!(
                "refused '{}'",
                command.name
            ))))
        } else {
            self.sent.lock().unwrap().push((device_id.clone(), command));
            Ok(())
        };
        async move { result }
    }
}

/// Protocol adapter double. Records sent commands; can be told to reject
/// every send or to respond only after a delay (for timeout tests).
#[derive(Default)]
pub(crate) struct FakeAdapter {
    pub sent: Mutex<Vec<(DeviceId, Command)>>,
    pub registered: Mutex<Vec<DeviceId>>,
    pub reject_with: Mutex<Option<String>>,
    pub respond_after: Mutex<Option<std::time::Duration>>,
    pub fail_connect: Mutex<bool>,
}

#[async_trait]
impl ProtocolAdapter for FakeAdapter {
    fn info(&self) -> ProtocolInfo {
        ProtocolInfo {
            name: "fake",
            version: "0.0.0",
            description: "recording test adapter",
        }
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        if *self.fail_connect.lock().unwrap() {
            return Err(ConnectError {
                protocol: "fake".to_string(),
                reason: "broker down".to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn register_device(&self, device: &Device, _on_state: StateCallback) -> bool {
        self.registered.lock().unwrap().push(device.id.clone());
        true
    }

    async fn unregister_device(&self, device: &Device) -> bool {
        let mut registered = self.registered.lock().unwrap();
        let before = registered.len();
        registered.retain(|id| id != &device.id);
        before != registered.len()
    }

    async fn send_command(&self, device: &Device, command: &Command) -> Result<(), SendError> {
        let delay = *self.respond_after.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let reject = self.reject_with.lock().unwrap().clone();
        if let Some(reason) = reject {
            return Err(SendError::Rejected(reason));
        }
        self.sent
            .lock()
            .unwrap()
            .push((device.id.clone(), command.clone()));
        Ok(())
    }

    async fn get_state(&self, _device: &Device) -> Option<StateMap> {
        None
    }

    async fn discover(&self) -> bool {
        true
    }
}
