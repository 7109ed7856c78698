//! # fleethub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository` — CRUD and state merges for devices
//!   - `ScriptRepository` — per-device script storage, upsert by name
//!   - `QueueRepository` — dense, positioned script queues
//!   - `AutomationRepository` — CRUD for automations
//!   - `EventStore` — append & query device events
//!   - `ProtocolAdapter` — transport-specific device IO
//!   - `Notifier` — outbound user notifications
//! - Define **driving/inbound ports** as use-case structs:
//!   - `DeviceService` — register, state updates, liveness, list, get
//!   - `ScriptService` — upload, list, delete (with queue cascade)
//!   - `QueueService` — enqueue, dequeue, inspect
//!   - `DeviceOrchestrator` — route commands through adapters, dispatch queues
//!   - `AutomationEngine` — evaluate triggers, run actions
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `fleethub-domain` only (plus `tokio::sync`/`tokio::time` for
//! channels and timers). Never imports adapter crates. Adapters depend on
//! *this* crate, not the reverse.

pub mod automation_engine;
pub mod event_bus;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
