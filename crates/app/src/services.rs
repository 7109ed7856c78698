//! Application services — inbound use-case ports.

pub mod device_service;
pub mod queue_service;
pub mod script_service;

pub use device_service::{DeviceFilter, DeviceService};
pub use queue_service::QueueService;
pub use script_service::ScriptService;
