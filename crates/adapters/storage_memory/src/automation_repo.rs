//! In-memory implementation of [`AutomationRepository`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use fleethub_app::ports::AutomationRepository;
use fleethub_domain::automation::Automation;
use fleethub_domain::error::{HubError, NotFoundError};
use fleethub_domain::id::AutomationId;

/// Automation repository behind a single map lock. Automations are not
/// device-scoped, so there is no per-device sharding here.
#[derive(Clone, Default)]
pub struct MemoryAutomationRepository {
    inner: Arc<RwLock<HashMap<AutomationId, Automation>>>,
}

impl MemoryAutomationRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AutomationRepository for MemoryAutomationRepository {
    fn create(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HubError>> + Send {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(automation.id, automation.clone());
        drop(map);
        async move { Ok(automation) }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, HubError>> + Send {
        let result = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned();
        async move { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, HubError>> + Send {
        let mut result: Vec<Automation> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async move { Ok(result) }
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<Automation>, HubError>> + Send {
        let mut result: Vec<Automation> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|a| a.enabled)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async move { Ok(result) }
    }

    fn update(
        &self,
        automation: Automation,
    ) -> impl Future<Output = Result<Automation, HubError>> + Send {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let result = if map.contains_key(&automation.id) {
            map.insert(automation.id, automation.clone());
            Ok(automation)
        } else {
            Err(NotFoundError {
                entity: "Automation",
                id: automation.id.to_string(),
            }
            .into())
        };
        drop(map);
        async move { result }
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), HubError>> + Send {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        async move { Ok(()) }
    }
}
