//! Device orchestrator — routes commands through protocol adapters and
//! dispatches queued scripts.
//!
//! The orchestrator composes the device, script, and queue services with a
//! runtime-bound set of protocol adapters. It owns the command path:
//! capability gating, adapter selection, the send timeout, and the
//! `command_sent` audit trail. It also implements [`CommandSink`] so the
//! automation engine can route actions back through the same path without a
//! direct dependency.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use fleethub_domain::capability::Capability;
use fleethub_domain::command::Command;
use fleethub_domain::device::{Device, StateDelta, StateMap};
use fleethub_domain::error::{
    ConfigError, ConnectError, HubError, NotFoundError, SendError, ValidationError,
};
use fleethub_domain::event::{DeviceEvent, EventKind};
use fleethub_domain::id::DeviceId;
use fleethub_domain::queue::{QueueEntry, QueueEntryStatus};
use fleethub_domain::time::now;

use crate::ports::{
    CommandSink, DeviceRepository, EventPublisher, EventStore, ProtocolAdapter, QueueRepository,
    ScriptRepository, StateCallback,
};
use crate::services::{DeviceFilter, DeviceService, QueueService, ScriptService};

/// Coordinates the registry, scripts, queues, and protocol adapters.
pub struct DeviceOrchestrator<DR, SR, QR, ES, P> {
    devices: DeviceService<DR, ES, P>,
    scripts: ScriptService<DR, SR, QR>,
    queue: QueueService<DR, SR, QR>,
    event_store: ES,
    publisher: P,
    adapters: RwLock<HashMap<String, Arc<dyn ProtocolAdapter>>>,
    command_timeout: std::time::Duration,
}

impl<DR, SR, QR, ES, P> DeviceOrchestrator<DR, SR, QR, ES, P>
where
    DR: DeviceRepository + Send + Sync,
    SR: ScriptRepository + Send + Sync,
    QR: QueueRepository + Send + Sync,
    ES: EventStore + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    /// Assemble an orchestrator from already-wired services.
    pub fn new(
        devices: DeviceService<DR, ES, P>,
        scripts: ScriptService<DR, SR, QR>,
        queue: QueueService<DR, SR, QR>,
        event_store: ES,
        publisher: P,
        command_timeout: std::time::Duration,
    ) -> Self {
        Self {
            devices,
            scripts,
            queue,
            event_store,
            publisher,
            adapters: RwLock::new(HashMap::new()),
            command_timeout,
        }
    }

    /// The device service, for registry reads and state updates.
    pub fn devices(&self) -> &DeviceService<DR, ES, P> {
        &self.devices
    }

    /// The script service.
    pub fn scripts(&self) -> &ScriptService<DR, SR, QR> {
        &self.scripts
    }

    /// The queue service.
    pub fn queue(&self) -> &QueueService<DR, SR, QR> {
        &self.queue
    }

    /// Bind an adapter to a protocol name, replacing any previous binding.
    pub fn bind_adapter(&self, protocol: impl Into<String>, adapter: Arc<dyn ProtocolAdapter>) {
        let protocol = protocol.into();
        tracing::debug!(%protocol, "binding protocol adapter");
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(protocol, adapter);
    }

    /// Register a device and subscribe it to its adapter's state updates.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Config`] when no adapter is bound for the
    /// device's protocol, [`HubError::Validation`] or [`HubError::Conflict`]
    /// from registration itself.
    #[tracing::instrument(skip(self, device, on_state), fields(device_id = %device.id))]
    pub async fn register_device(
        &self,
        device: Device,
        on_state: StateCallback,
    ) -> Result<Device, HubError> {
        let adapter = self.adapter_for(&device.protocol)?;
        let created = self.devices.register_device(device).await?;
        if !adapter.register_device(&created, on_state).await {
            tracing::warn!(device_id = %created.id, "adapter declined device registration");
        }
        Ok(created)
    }

    /// Remove a device and everything that hangs off it: adapter
    /// registration, queue entries, and scripts. Returns whether a device
    /// was removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repositories.
    #[tracing::instrument(skip(self))]
    pub async fn remove_device(&self, id: &DeviceId) -> Result<bool, HubError> {
        let device = match self.devices.get_device(id).await {
            Ok(device) => device,
            Err(HubError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        if let Ok(adapter) = self.adapter_for(&device.protocol) {
            adapter.unregister_device(&device).await;
        }
        self.queue.clear(id).await?;
        self.scripts.delete_all_for_device(id).await?;
        self.devices.delete_device(id).await
    }

    /// Feed a state update coming from an adapter into the registry.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the device is not registered.
    pub async fn handle_state_update(
        &self,
        id: &DeviceId,
        partial: StateMap,
    ) -> Result<StateDelta, HubError> {
        self.devices.apply_state_update(id, partial).await
    }

    /// Validate and deliver a command to a device.
    ///
    /// Capability gating happens before any adapter involvement: a command
    /// whose required capability is missing fails with
    /// [`ValidationError::MissingCapability`] and the adapter is never
    /// called. Delivery is bounded by the configured timeout; both success
    /// and failure leave a `command_sent` event behind.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`], [`HubError::Validation`],
    /// [`HubError::Config`] when no adapter is bound, or [`HubError::Send`]
    /// when the adapter rejects, times out, or cannot reach the device.
    #[tracing::instrument(skip(self, command), fields(command = %command))]
    pub async fn send_command(
        &self,
        device_id: &DeviceId,
        command: Command,
    ) -> Result<(), HubError> {
        let device = self.devices.get_device(device_id).await?;
        if let Some(capability) = Capability::required_for(&command.name) {
            if !device.capabilities.contains(&capability) {
                return Err(ValidationError::MissingCapability {
                    command: command.name,
                    capability,
                }
                .into());
            }
        }
        let adapter = self.adapter_for(&device.protocol)?;
        if !adapter.validate_command(&device, &command) {
            return Err(SendError::Rejected(format!("adapter refused '{command}'")).into());
        }

        let outcome =
            match tokio::time::timeout(self.command_timeout, adapter.send_command(&device, &command))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SendError::Timeout),
            };
        match outcome {
            Ok(()) => {
                self.record_event(
                    device_id,
                    EventKind::CommandSent,
                    format!("command sent: {command}"),
                )
                .await?;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%device_id, %command, error = %err, "command delivery failed");
                self.record_event(
                    device_id,
                    EventKind::CommandSent,
                    format!("command failed: {command}: {err}"),
                )
                .await?;
                self.record_event(
                    device_id,
                    EventKind::Error,
                    format!("adapter failure on '{command}': {err}"),
                )
                .await?;
                Err(err.into())
            }
        }
    }

    /// Pop-and-run: execute the head queue entry as a `run_script` command.
    ///
    /// On success the entry is removed (remaining entries renumber) and
    /// returned with a completed status. On failure the entry stays at its
    /// position, marked failed with the error recorded; it is never retried
    /// automatically.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when the queue is empty or the
    /// referenced script has vanished, or the delivery error from
    /// [`send_command`](Self::send_command).
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_next(&self, device_id: &DeviceId) -> Result<QueueEntry, HubError> {
        let Some(entry) = self.queue.head(device_id).await? else {
            return Err(NotFoundError {
                entity: "QueueEntry",
                id: device_id.to_string(),
            }
            .into());
        };
        self.queue
            .set_status(device_id, entry.id, QueueEntryStatus::Running, None)
            .await?;

        let script = match self.scripts.get_script(device_id, &entry.script_name).await {
            Ok(script) => script,
            Err(err) => {
                self.queue
                    .set_status(
                        device_id,
                        entry.id,
                        QueueEntryStatus::Failed,
                        Some(err.to_string()),
                    )
                    .await?;
                return Err(err);
            }
        };

        let command = Command::run_script(&script.name, &script.body);
        match self.send_command(device_id, command).await {
            Ok(()) => {
                let mut done = self
                    .queue
                    .remove_entry(device_id, entry.id)
                    .await?
                    .unwrap_or(entry);
                done.status = QueueEntryStatus::Completed;
                done.executed_at = Some(now());
                Ok(done)
            }
            Err(err) => {
                self.queue
                    .set_status(
                        device_id,
                        entry.id,
                        QueueEntryStatus::Failed,
                        Some(err.to_string()),
                    )
                    .await?;
                Err(err)
            }
        }
    }

    /// Connect every bound adapter, returning the failures. A failed
    /// connect never takes the process down; adapters reconnect on their
    /// own schedule.
    pub async fn connect_all(&self) -> Vec<(String, ConnectError)> {
        let mut failures = Vec::new();
        for (protocol, adapter) in self.adapter_snapshot() {
            if let Err(err) = adapter.connect().await {
                tracing::warn!(%protocol, error = %err, "adapter connect failed");
                self.record_connect_failure(&protocol, &err).await;
                failures.push((protocol, err));
            }
        }
        failures
    }

    /// Leave an `error` event on every device behind an adapter that
    /// failed to connect. Best-effort: recording trouble is only logged.
    async fn record_connect_failure(&self, protocol: &str, err: &ConnectError) {
        let filter = DeviceFilter {
            protocol: Some(protocol.to_string()),
            status: None,
        };
        let devices = match self.devices.list_devices(&filter).await {
            Ok(devices) => devices,
            Err(list_err) => {
                tracing::warn!(%protocol, error = %list_err, "could not list devices for connect failure");
                return;
            }
        };
        for device in devices {
            let message = format!("adapter connect failed: {err}");
            if let Err(record_err) = self
                .record_event(&device.id, EventKind::Error, message)
                .await
            {
                tracing::warn!(device_id = %device.id, error = %record_err, "could not record connect failure");
            }
        }
    }

    /// Disconnect every bound adapter.
    pub async fn disconnect_all(&self) {
        for (_, adapter) in self.adapter_snapshot() {
            adapter.disconnect().await;
        }
    }

    /// Ask every adapter to start discovery; returns how many did.
    pub async fn discover_all(&self) -> usize {
        let mut started = 0;
        for (_, adapter) in self.adapter_snapshot() {
            if adapter.discover().await {
                started += 1;
            }
        }
        started
    }

    fn adapter_for(&self, protocol: &str) -> Result<Arc<dyn ProtocolAdapter>, HubError> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .cloned()
            .ok_or_else(|| HubError::Config(ConfigError::UnknownProtocol(protocol.to_string())))
    }

    fn adapter_snapshot(&self) -> Vec<(String, Arc<dyn ProtocolAdapter>)> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, adapter)| (name.clone(), Arc::clone(adapter)))
            .collect()
    }

    async fn record_event(
        &self,
        device_id: &DeviceId,
        kind: EventKind,
        message: String,
    ) -> Result<(), HubError> {
        let event = DeviceEvent::new(device_id.clone(), kind).with_message(message);
        self.event_store.append(event.clone()).await?;
        self.publisher.publish(event).await
    }
}

impl<DR, SR, QR, ES, P> CommandSink for DeviceOrchestrator<DR, SR, QR, ES, P>
where
    DR: DeviceRepository + Send + Sync,
    SR: ScriptRepository + Send + Sync,
    QR: QueueRepository + Send + Sync,
    ES: EventStore + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    fn submit_command(
        &self,
        device_id: &DeviceId,
        command: Command,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        self.send_command(device_id, command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleethub_domain::device::DeviceStatus;

    use crate::test_support::{
        CapturingEventStore, CapturingPublisher, FakeAdapter, InMemoryDeviceRepo,
        InMemoryQueueRepo, InMemoryScriptRepo,
    };

    type TestOrchestrator = DeviceOrchestrator<
        InMemoryDeviceRepo,
        InMemoryScriptRepo,
        InMemoryQueueRepo,
        CapturingEventStore,
        CapturingPublisher,
    >;

    struct Harness {
        orchestrator: TestOrchestrator,
        adapter: Arc<FakeAdapter>,
        store: CapturingEventStore,
    }

    fn make_harness() -> Harness {
        make_harness_with_timeout(std::time::Duration::from_secs(5))
    }

    fn make_harness_with_timeout(timeout: std::time::Duration) -> Harness {
        let device_repo = InMemoryDeviceRepo::default();
        let script_repo = InMemoryScriptRepo::default();
        let queue_repo = InMemoryQueueRepo::default();
        let store = CapturingEventStore::default();
        let publisher = CapturingPublisher::default();

        let orchestrator = DeviceOrchestrator::new(
            DeviceService::new(
                device_repo.clone(),
                store.clone(),
                publisher.clone(),
                chrono::Duration::seconds(60),
            ),
            ScriptService::new(device_repo.clone(), script_repo.clone(), queue_repo.clone()),
            QueueService::new(device_repo, script_repo, queue_repo),
            store.clone(),
            publisher,
            timeout,
        );
        let adapter = Arc::new(FakeAdapter::default());
        orchestrator.bind_adapter("virtual", adapter.clone());
        Harness {
            orchestrator,
            adapter,
            store,
        }
    }

    fn device_id() -> DeviceId {
        DeviceId::new("AA:BB:CC:DD:EE:FF")
    }

    fn lamp() -> Device {
        Device::builder()
            .id("AA:BB:CC:DD:EE:FF")
            .name("Desk Lamp")
            .protocol("virtual")
            .capability(Capability::OnOff)
            .build()
            .unwrap()
    }

    fn noop_callback() -> StateCallback {
        Arc::new(|_, _| {})
    }

    async fn seed_device(h: &Harness) {
        h.orchestrator
            .register_device(lamp(), noop_callback())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn should_register_device_with_its_adapter() {
        let h = make_harness();
        seed_device(&h).await;

        assert_eq!(h.adapter.registered.lock().unwrap().len(), 1);
        let fetched = h.orchestrator.devices().get_device(&device_id()).await.unwrap();
        assert_eq!(fetched.status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn should_reject_registration_when_no_adapter_bound() {
        let h = make_harness();
        let device = Device::builder()
            .id("11:22:33:44:55:66")
            .name("Zigbee Plug")
            .protocol("zigbee")
            .build()
            .unwrap();

        let result = h.orchestrator.register_device(device, noop_callback()).await;
        assert!(matches!(
            result,
            Err(HubError::Config(ConfigError::UnknownProtocol(_)))
        ));
    }

    #[tokio::test]
    async fn should_send_command_and_record_event() {
        let h = make_harness();
        seed_device(&h).await;

        h.orchestrator
            .send_command(&device_id(), Command::new("turn_on"))
            .await
            .unwrap();

        let sent = h.adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.name, "turn_on");

        let events = h.store.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::CommandSent);
        assert_eq!(events[0].message.as_deref(), Some("command sent: turn_on"));
    }

    #[tokio::test]
    async fn should_reject_command_missing_capability_without_calling_adapter() {
        let h = make_harness();
        seed_device(&h).await;

        let result = h
            .orchestrator
            .send_command(&device_id(), Command::new("set_color"))
            .await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::MissingCapability {
                ..
            }))
        ));
        assert!(h.adapter.sent.lock().unwrap().is_empty());
        assert!(h.store.events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_slow_adapter_send() {
        let h = make_harness_with_timeout(std::time::Duration::from_millis(100));
        seed_device(&h).await;
        *h.adapter.respond_after.lock().unwrap() = Some(std::time::Duration::from_secs(10));

        let result = h
            .orchestrator
            .send_command(&device_id(), Command::new("turn_on"))
            .await;
        assert!(matches!(result, Err(HubError::Send(SendError::Timeout))));

        let events = h.store.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::CommandSent);
        assert!(events[0]
            .message
            .as_deref()
            .unwrap()
            .starts_with("command failed: turn_on"));
        assert_eq!(events[1].kind, EventKind::Error);
    }

    #[tokio::test]
    async fn should_record_failure_event_when_adapter_rejects() {
        let h = make_harness();
        seed_device(&h).await;
        *h.adapter.reject_with.lock().unwrap() = Some("device busy".to_string());

        let result = h
            .orchestrator
            .send_command(&device_id(), Command::new("turn_on"))
            .await;
        assert!(matches!(result, Err(HubError::Send(SendError::Rejected(_)))));

        // The failure leaves both a command audit and an error event.
        let events = h.store.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::CommandSent);
        assert!(events[0].message.as_deref().unwrap().contains("device busy"));
        assert_eq!(events[1].kind, EventKind::Error);
        assert!(events[1].message.as_deref().unwrap().contains("device busy"));
    }

    #[tokio::test]
    async fn should_record_error_events_for_devices_behind_failed_connect() {
        let h = make_harness();
        seed_device(&h).await;
        *h.adapter.fail_connect.lock().unwrap() = true;

        let failures = h.orchestrator.connect_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "virtual");

        let events = h.store.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert_eq!(events[0].device_id, device_id());
        assert!(events[0]
            .message
            .as_deref()
            .unwrap()
            .contains("connect failed"));
    }

    #[tokio::test]
    async fn should_dispatch_head_entry_and_compact_queue() {
        let h = make_harness();
        seed_device(&h).await;
        h.orchestrator
            .scripts()
            .upload_script(&device_id(), "blink", "led.on(); led.off()")
            .await
            .unwrap();
        h.orchestrator.queue().enqueue(&device_id(), "blink").await.unwrap();
        h.orchestrator.queue().enqueue(&device_id(), "blink").await.unwrap();

        let done = h.orchestrator.dispatch_next(&device_id()).await.unwrap();
        assert_eq!(done.status, QueueEntryStatus::Completed);
        assert!(done.executed_at.is_some());

        let remaining = h.orchestrator.queue().entries(&device_id()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].position, 0);

        // The adapter saw a run_script command carrying the body.
        let sent = h.adapter.sent.lock().unwrap();
        assert_eq!(sent[0].1.name, "run_script");
        assert_eq!(sent[0].1.payload["body"], "led.on(); led.off()");
    }

    #[tokio::test]
    async fn should_dispatch_script_to_device_without_custom_script_capability() {
        // run_script is not capability-gated; an on/off-only device can
        // still execute queued scripts.
        let h = make_harness();
        seed_device(&h).await;
        h.orchestrator
            .scripts()
            .upload_script(&device_id(), "blink", "noop")
            .await
            .unwrap();
        h.orchestrator.queue().enqueue(&device_id(), "blink").await.unwrap();

        let done = h.orchestrator.dispatch_next(&device_id()).await.unwrap();
        assert_eq!(done.status, QueueEntryStatus::Completed);
    }

    #[tokio::test]
    async fn should_keep_failed_entry_at_its_position() {
        let h = make_harness();
        seed_device(&h).await;
        h.orchestrator
            .scripts()
            .upload_script(&device_id(), "blink", "noop")
            .await
            .unwrap();
        h.orchestrator.queue().enqueue(&device_id(), "blink").await.unwrap();
        *h.adapter.reject_with.lock().unwrap() = Some("flash failure".to_string());

        let result = h.orchestrator.dispatch_next(&device_id()).await;
        assert!(matches!(result, Err(HubError::Send(_))));

        let entries = h.orchestrator.queue().entries(&device_id()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].position, 0);
        assert_eq!(entries[0].status, QueueEntryStatus::Failed);
        assert!(entries[0].result.as_deref().unwrap().contains("flash failure"));
        assert!(entries[0].executed_at.is_some());
    }

    #[tokio::test]
    async fn should_return_not_found_when_queue_is_empty() {
        let h = make_harness();
        seed_device(&h).await;

        let result = h.orchestrator.dispatch_next(&device_id()).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_cascade_removal_to_scripts_queue_and_adapter() {
        let h = make_harness();
        seed_device(&h).await;
        h.orchestrator
            .scripts()
            .upload_script(&device_id(), "blink", "noop")
            .await
            .unwrap();
        h.orchestrator.queue().enqueue(&device_id(), "blink").await.unwrap();

        let removed = h.orchestrator.remove_device(&device_id()).await.unwrap();
        assert!(removed);
        assert!(h.adapter.registered.lock().unwrap().is_empty());

        let result = h.orchestrator.devices().get_device(&device_id()).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));

        // Removing again is a quiet no-op.
        let removed_again = h.orchestrator.remove_device(&device_id()).await.unwrap();
        assert!(!removed_again);
    }

    #[tokio::test]
    async fn should_feed_adapter_state_updates_into_registry() {
        let h = make_harness();
        seed_device(&h).await;

        let mut partial = StateMap::new();
        partial.insert("power".to_string(), serde_json::json!("on"));
        let delta = h
            .orchestrator
            .handle_state_update(&device_id(), partial)
            .await
            .unwrap();
        assert_eq!(delta.new["power"], "on");

        let device = h.orchestrator.devices().get_device(&device_id()).await.unwrap();
        assert_eq!(device.status, DeviceStatus::Online);
    }
}
