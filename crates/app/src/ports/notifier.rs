//! Notifier port — outbound user notifications.

use std::future::Future;

use fleethub_domain::automation::NotifyPriority;
use fleethub_domain::error::HubError;

/// Delivers notifications produced by automation actions. The core treats
/// delivery as best-effort; implementations decide the channel.
pub trait Notifier {
    /// Send one notification.
    fn notify(
        &self,
        title: &str,
        message: &str,
        priority: NotifyPriority,
    ) -> impl Future<Output = Result<(), HubError>> + Send;
}

impl<T: Notifier + Send + Sync> Notifier for std::sync::Arc<T> {
    fn notify(
        &self,
        title: &str,
        message: &str,
        priority: NotifyPriority,
    ) -> impl Future<Output = Result<(), HubError>> + Send {
        (**self).notify(title, message, priority)
    }
}
