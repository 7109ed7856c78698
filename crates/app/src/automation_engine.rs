//! Automation engine — evaluates triggers and executes actions.
//!
//! Condition triggers (state transitions, thresholds) are evaluated
//! synchronously against every state delta, in the order the deltas were
//! applied. Time triggers are evaluated by an external polling cadence
//! calling [`AutomationEngine::evaluate_time_triggers`].
//!
//! Each firing's action sequence runs on its own task: a `delay` action
//! parks only that firing, never the evaluation path, so deltas keep
//! flowing while an automation waits. Actions run strictly in list order;
//! the first failure skips the remaining actions of that firing, is logged
//! and recorded as an `error` event, and never prevents other automations
//! from firing.

use std::sync::Arc;

use fleethub_domain::automation::{Action, Automation};
use fleethub_domain::device::StateDelta;
use fleethub_domain::error::HubError;
use fleethub_domain::event::{DeviceEvent, EventKind};
use fleethub_domain::id::{AutomationId, DeviceId};
use fleethub_domain::time::{now, Timestamp};

use crate::ports::{AutomationRepository, CommandSink, EventPublisher, EventStore, Notifier};

/// Reactive rule engine over the automation repository.
///
/// Clones share the same collaborators; the engine hands a clone of itself
/// to each firing's action task.
pub struct AutomationEngine<AR, CS, N, ES, P> {
    inner: Arc<Inner<AR, CS, N, ES, P>>,
}

struct Inner<AR, CS, N, ES, P> {
    repo: AR,
    commands: CS,
    notifier: N,
    event_store: ES,
    publisher: P,
}

impl<AR, CS, N, ES, P> Clone for AutomationEngine<AR, CS, N, ES, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<AR, CS, N, ES, P> AutomationEngine<AR, CS, N, ES, P>
where
    AR: AutomationRepository + Send + Sync + 'static,
    CS: CommandSink + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
    ES: EventStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
{
    /// Create a new engine.
    pub fn new(repo: AR, commands: CS, notifier: N, event_store: ES, publisher: P) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                commands,
                notifier,
                event_store,
                publisher,
            }),
        }
    }

    /// Evaluate every enabled automation against one state delta and fire
    /// the matches. Returns the ids of the automations that fired.
    ///
    /// # Errors
    ///
    /// Returns a storage error if loading or updating automations fails.
    /// Action failures do not surface here; each firing's actions run on
    /// their own task, with failures logged and recorded as `error` events.
    #[tracing::instrument(skip(self, delta))]
    pub async fn process_delta(
        &self,
        device_id: &DeviceId,
        delta: &StateDelta,
    ) -> Result<Vec<AutomationId>, HubError> {
        let automations = self.inner.repo.get_enabled().await?;
        let mut fired = Vec::new();
        for automation in automations {
            if !automation.trigger.matches_delta(device_id, delta) {
                continue;
            }
            let id = automation.id;
            self.fire(automation, Some(device_id)).await?;
            fired.push(id);
        }
        Ok(fired)
    }

    /// Evaluate every enabled time-based automation against `at` and fire
    /// the ones that are due. Returns the ids of the automations that
    /// fired.
    ///
    /// # Errors
    ///
    /// Returns a storage error if loading or updating automations fails.
    pub async fn evaluate_time_triggers(
        &self,
        at: Timestamp,
    ) -> Result<Vec<AutomationId>, HubError> {
        let automations = self.inner.repo.get_enabled().await?;
        let mut fired = Vec::new();
        for automation in automations {
            if !automation.trigger.is_due(at, automation.last_triggered) {
                continue;
            }
            let id = automation.id;
            self.fire(automation, None).await?;
            fired.push(id);
        }
        Ok(fired)
    }

    /// Stamp `last_triggered`, record the trigger event, and hand the
    /// action sequence to its own task.
    ///
    /// Time firings carry no delta device; the event is recorded against
    /// the first device an action targets instead. A firing that targets
    /// no device at all (notification-only) is only logged.
    async fn fire(
        &self,
        mut automation: Automation,
        device: Option<&DeviceId>,
    ) -> Result<(), HubError> {
        tracing::info!(automation = %automation.name, "automation fired");
        let name = automation.name.clone();
        let actions = automation.actions.clone();
        let context = device.cloned().or_else(|| first_target_device(&actions));

        automation.last_triggered = Some(now());
        self.inner.repo.update(automation).await?;

        if let Some(device_id) = context.clone() {
            let event = DeviceEvent::new(device_id, EventKind::AutomationTriggered)
                .with_message(format!("automation '{name}' triggered"));
            self.inner.event_store.append(event.clone()).await?;
            self.inner.publisher.publish(event).await?;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_actions(name, actions, context).await;
        });
        Ok(())
    }

    /// Run one firing's actions in list order, stopping at the first
    /// failure.
    async fn run_actions(&self, name: String, actions: Vec<Action>, context: Option<DeviceId>) {
        for action in &actions {
            let Err(err) = self.execute_action(action).await else {
                continue;
            };
            tracing::warn!(
                automation = %name,
                action = %action,
                error = %err,
                "action failed, skipping remaining actions"
            );
            if let Some(device_id) = context {
                let event = DeviceEvent::new(device_id, EventKind::Error)
                    .with_message(format!("automation '{name}' action failed: {err}"));
                if let Err(err) = self.record(event).await {
                    tracing::warn!(error = %err, "could not record action failure");
                }
            }
            break;
        }
    }

    async fn record(&self, event: DeviceEvent) -> Result<(), HubError> {
        self.inner.event_store.append(event.clone()).await?;
        self.inner.publisher.publish(event).await
    }

    /// Execute a single action.
    async fn execute_action(&self, action: &Action) -> Result<(), HubError> {
        match action {
            Action::DeviceCommand { device_id, command } => {
                self.inner
                    .commands
                    .submit_command(device_id, command.clone())
                    .await
            }
            Action::Scene { name, commands } => {
                tracing::debug!(scene = %name, commands = commands.len(), "running scene");
                for scene_command in commands {
                    self.inner
                        .commands
                        .submit_command(&scene_command.device_id, scene_command.command.clone())
                        .await?;
                }
                Ok(())
            }
            Action::Notification {
                title,
                message,
                priority,
            } => self.inner.notifier.notify(title, message, *priority).await,
            Action::Delay { seconds } => {
                tokio::time::sleep(std::time::Duration::from_secs(*seconds)).await;
                Ok(())
            }
        }
    }
}

/// The first device any action in the list addresses.
fn first_target_device(actions: &[Action]) -> Option<DeviceId> {
    actions.iter().find_map(|action| match action {
        Action::DeviceCommand { device_id, .. } => Some(device_id.clone()),
        Action::Scene { commands, .. } => commands.first().map(|c| c.device_id.clone()),
        Action::Notification { .. } | Action::Delay { .. } => None,
    })
}
