//! Command sink port — where automation actions hand off device commands.
//!
//! The automation engine must not depend on the orchestrator type directly
//! (the orchestrator also feeds state deltas *into* the engine); this small
//! port breaks the cycle.

use std::future::Future;

use fleethub_domain::command::Command;
use fleethub_domain::error::HubError;
use fleethub_domain::id::DeviceId;

/// Accepts commands for routing to a device.
pub trait CommandSink {
    /// Validate and deliver a command to the device.
    fn submit_command(
        &self,
        device_id: &DeviceId,
        command: Command,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: CommandSink + Send + Sync> CommandSink for std::sync::Arc<T> {
    fn submit_command(
        &self,
        device_id: &DeviceId,
        command: Command,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).submit_command(device_id, command)
    }
}
