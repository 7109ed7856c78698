//! Notifier that writes automation notifications to the log.

use std::future::Future;

use fleethub_app::ports::Notifier;
use fleethub_domain::automation::NotifyPriority;
use fleethub_domain::error::HubError;

/// Emits notifications as tracing events, leveled by priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(
        &self,
        title: &str,
        message: &str,
        priority: NotifyPriority,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        match priority {
            NotifyPriority::Low => tracing::debug!(%title, %message, "notification"),
            NotifyPriority::Normal => tracing::info!(%title, %message, "notification"),
            NotifyPriority::High => tracing::warn!(%title, %message, "notification"),
        }
        async { Ok(()) }
    }
}
