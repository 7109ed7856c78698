//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod command_sink;
pub mod event_bus;
pub mod event_store;
pub mod notifier;
pub mod protocol;
pub mod storage;

pub use command_sink::CommandSink;
pub use event_bus::EventPublisher;
pub use event_store::EventStore;
pub use notifier::Notifier;
pub use protocol::{ProtocolAdapter, ProtocolInfo, StateCallback};
pub use storage::{AutomationRepository, DeviceRepository, QueueRepository, ScriptRepository};
