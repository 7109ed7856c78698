//! # fleethubd — fleethub daemon
//!
//! Composition root that wires every adapter together and runs the hub.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Build the protocol registry and connect the enabled adapters
//! - Run the background tasks: event-bus pump and time-trigger polling
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod notifier;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use fleethub_adapter_storage_memory::{
    MemoryAutomationRepository, MemoryDeviceRepository, MemoryEventStore, MemoryQueueRepository,
    MemoryScriptRepository,
};
use fleethub_app::automation_engine::AutomationEngine;
use fleethub_app::event_bus::InProcessEventBus;
use fleethub_app::orchestrator::DeviceOrchestrator;
use fleethub_app::ports::StateCallback;
use fleethub_app::registry::ProtocolRegistry;
use fleethub_app::services::{DeviceService, QueueService, ScriptService};
use fleethub_domain::capability::Capability;
use fleethub_domain::device::{Device, StateDelta};
use fleethub_domain::event::{DeviceEvent, EventKind};
use fleethub_domain::time::now;

use config::Config;
use notifier::LogNotifier;

type Orchestrator = DeviceOrchestrator<
    MemoryDeviceRepository,
    MemoryScriptRepository,
    MemoryQueueRepository,
    MemoryEventStore,
    Arc<InProcessEventBus>,
>;

type Engine = AutomationEngine<
    MemoryAutomationRepository,
    Arc<Orchestrator>,
    LogNotifier,
    MemoryEventStore,
    Arc<InProcessEventBus>,
>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    // Repositories
    let device_repo = MemoryDeviceRepository::new();
    let script_repo = MemoryScriptRepository::new();
    let queue_repo = MemoryQueueRepository::new();
    let automation_repo = MemoryAutomationRepository::new();
    let event_store = MemoryEventStore::new();

    // Event bus
    let bus = Arc::new(InProcessEventBus::new(config.hub.event_bus_capacity));

    // Services
    let device_service = DeviceService::new(
        device_repo.clone(),
        event_store.clone(),
        Arc::clone(&bus),
        chrono::Duration::seconds(i64::try_from(config.hub.offline_after_secs)?),
    );
    let script_service = ScriptService::new(
        device_repo.clone(),
        script_repo.clone(),
        queue_repo.clone(),
    );
    let queue_service = QueueService::new(device_repo, script_repo, queue_repo);

    let orchestrator = Arc::new(DeviceOrchestrator::new(
        device_service,
        script_service,
        queue_service,
        event_store.clone(),
        Arc::clone(&bus),
        Duration::from_secs(config.hub.command_timeout_secs),
    ));

    // Protocol registry and adapters
    let mut registry = ProtocolRegistry::new();
    if config.adapters.virtual_enabled {
        fleethub_adapter_virtual::register(&mut registry);
    }
    if config.adapters.mqtt_enabled {
        fleethub_adapter_mqtt::register(&mut registry);
    }
    tracing::info!(protocols = ?registry.supported(), "protocol registry assembled");

    if config.adapters.virtual_enabled {
        let adapter = registry.create("virtual", &serde_json::json!({}))?;
        orchestrator.bind_adapter("virtual", adapter);
    }
    if config.adapters.mqtt_enabled {
        let adapter = registry.create("mqtt", &config.adapters.mqtt)?;
        orchestrator.bind_adapter("mqtt", adapter);
    }

    for (protocol, err) in orchestrator.connect_all().await {
        tracing::error!(%protocol, error = %err, "adapter failed to connect");
    }
    let discovering = orchestrator.discover_all().await;
    tracing::info!(adapters = discovering, "discovery initiated");

    // Automation engine, routing actions through the orchestrator's
    // validated command path.
    let engine = Arc::new(AutomationEngine::new(
        automation_repo,
        Arc::clone(&orchestrator),
        LogNotifier,
        event_store,
        Arc::clone(&bus),
    ));

    let pump = tokio::spawn(run_event_pump(bus.subscribe(), Arc::clone(&engine)));
    let poller = tokio::spawn(run_time_triggers(
        Arc::clone(&engine),
        Duration::from_secs(config.hub.automation_poll_secs),
    ));

    if config.adapters.virtual_enabled {
        seed_demo_device(&orchestrator).await;
    }

    tracing::info!("fleethubd running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    pump.abort();
    poller.abort();
    orchestrator.disconnect_all().await;
    Ok(())
}

/// Build the callback adapters use to push device state into the registry.
fn state_callback(orchestrator: &Arc<Orchestrator>) -> StateCallback {
    let orchestrator = Arc::clone(orchestrator);
    Arc::new(move |device_id, state| {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if let Err(err) = orchestrator.handle_state_update(&device_id, state).await {
                tracing::warn!(
                    device_id = device_id.as_str(),
                    error = %err,
                    "dropping state update"
                );
            }
        });
    })
}

/// Register a simulated lamp on the virtual adapter so a fresh install has
/// something to look at.
async fn seed_demo_device(orchestrator: &Arc<Orchestrator>) {
    let device = Device::builder()
        .id("AA:BB:CC:DD:EE:01")
        .name("Demo Lamp")
        .protocol("virtual")
        .capability(Capability::OnOff)
        .capability(Capability::Brightness)
        .build();
    let device = match device {
        Ok(device) => device,
        Err(err) => {
            tracing::warn!(error = %err, "demo device definition is invalid");
            return;
        }
    };
    match orchestrator
        .register_device(device, state_callback(orchestrator))
        .await
    {
        Ok(created) => tracing::info!(device_id = created.id.as_str(), "demo device registered"),
        Err(err) => tracing::warn!(error = %err, "failed to register demo device"),
    }
}

/// Forward state-change events from the bus into the automation engine.
async fn run_event_pump(
    mut rx: tokio::sync::broadcast::Receiver<DeviceEvent>,
    engine: Arc<Engine>,
) {
    loop {
        match rx.recv().await {
            Ok(event) if event.kind == EventKind::StateChange => {
                let (Some(old), Some(new)) = (event.old_state, event.new_state) else {
                    continue;
                };
                let delta = StateDelta { old, new };
                if let Err(err) = engine.process_delta(&event.device_id, &delta).await {
                    tracing::warn!(
                        device_id = event.device_id.as_str(),
                        error = %err,
                        "automation evaluation failed"
                    );
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event pump lagged behind the bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Evaluate time-based triggers on a fixed cadence.
async fn run_time_triggers(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if let Err(err) = engine.evaluate_time_triggers(now()).await {
            tracing::warn!(error = %err, "time-trigger evaluation failed");
        }
    }
}
