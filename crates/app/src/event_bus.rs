//! Broadcast-channel event bus shared by the daemon's background tasks.

use std::future::Future;

use tokio::sync::broadcast;

use fleethub_domain::error::HubError;
use fleethub_domain::event::DeviceEvent;

use crate::ports::EventPublisher;

/// Fan-out for [`DeviceEvent`]s inside the process.
///
/// Wraps a tokio [`broadcast`] channel: every subscriber sees every event
/// published after it joined. A slow subscriber that falls more than
/// `capacity` events behind observes a `Lagged` error on its receiver
/// rather than stalling publishers.
pub struct InProcessEventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl InProcessEventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Open a new subscription. Events published earlier are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: DeviceEvent) -> impl Future<Output = Result<(), HubError>> + Send {
        // send only errors with zero receivers; publishing into the void
        // is allowed.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}
