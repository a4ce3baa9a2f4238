//! Reward engine seam.
//!
//! The engine owns the rule catalog and the point ledger; the relay only
//! hands it scored events. The trait mirrors the four questions the dispatch
//! pipeline asks: is this event switched on for the organization, does a rule
//! exist for it, which rules does it cancel, and the two submission calls.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::RelayError;
use crate::model::{EventName, OrganizationId, ScoredEvent};

/// One entry of the engine's event catalog.
///
/// `properties` carries per-organization enablement as `{organization id}.enabled`
/// keys. An entry with no properties is enabled everywhere; once any
/// organization has an explicit setting, organizations without one count as
/// disabled.
#[derive(Debug, Clone, Default)]
pub struct CatalogEntry {
    pub id: i64,
    pub title: String,
    pub properties: HashMap<String, String>,
    /// Event names that undo this entry's rule when they arrive.
    pub cancellers: Vec<String>,
}

impl CatalogEntry {
    fn enabled_for(&self, organization_id: OrganizationId) -> bool {
        if self.properties.is_empty() {
            return true;
        }
        self.properties
            .get(&format!("{organization_id}.enabled"))
            .map(|value| value == "true")
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait RewardEngine: Send + Sync {
    /// Whether the named event is switched on for an organization. Events
    /// without a catalog entry are on; the filter only ever narrows.
    async fn event_enabled(
        &self,
        name: EventName,
        organization_id: OrganizationId,
    ) -> Result<bool, RelayError>;

    /// Flip an event's per-organization switch by catalog id. Fails with
    /// [`RelayError::NotFound`] for an unknown id.
    async fn set_event_enabled(
        &self,
        event_id: i64,
        organization_id: OrganizationId,
        enabled: bool,
    ) -> Result<(), RelayError>;

    /// Whether an active rule is titled after the event name.
    async fn rule_exists(&self, name: EventName) -> Result<bool, RelayError>;

    /// Switch off every rule scoped to an organization. Called when the
    /// organization's registration is deleted, so orphaned rules stop
    /// offering points nobody can earn. Returns how many rules were
    /// disabled.
    async fn disable_rules_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<usize, RelayError>;

    /// Titles of rules that list the event name as a canceller.
    async fn cancellation_rules(&self, name: EventName) -> Result<Vec<String>, RelayError>;

    /// Submit a scored event for points.
    async fn submit(&self, event: ScoredEvent) -> Result<(), RelayError>;

    /// Submit a scored event that revokes previously earned points.
    async fn submit_cancellation(&self, event: ScoredEvent) -> Result<(), RelayError>;
}

// ============================================================================
// In-memory engine
// ============================================================================

#[derive(Default)]
struct EngineInner {
    catalog: Vec<CatalogEntry>,
    rules: Vec<String>,
    submitted: Vec<ScoredEvent>,
    cancelled: Vec<ScoredEvent>,
}

/// In-memory reward engine for testing and development. Records submissions
/// instead of scoring them.
#[derive(Default)]
pub struct MemoryRewardEngine {
    inner: Mutex<EngineInner>,
}

impl MemoryRewardEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_catalog_entry(&self, entry: CatalogEntry) {
        self.inner.lock().await.catalog.push(entry);
    }

    /// Register an active rule titled after an event name.
    pub async fn add_rule(&self, title: impl Into<String>) {
        self.inner.lock().await.rules.push(title.into());
    }

    pub async fn submitted(&self) -> Vec<ScoredEvent> {
        self.inner.lock().await.submitted.clone()
    }

    pub async fn cancelled(&self) -> Vec<ScoredEvent> {
        self.inner.lock().await.cancelled.clone()
    }
}

#[async_trait]
impl RewardEngine for MemoryRewardEngine {
    async fn event_enabled(
        &self,
        name: EventName,
        organization_id: OrganizationId,
    ) -> Result<bool, RelayError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .catalog
            .iter()
            .find(|entry| entry.title == name.as_str())
            .map(|entry| entry.enabled_for(organization_id))
            .unwrap_or(true))
    }

    async fn set_event_enabled(
        &self,
        event_id: i64,
        organization_id: OrganizationId,
        enabled: bool,
    ) -> Result<(), RelayError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .catalog
            .iter_mut()
            .find(|entry| entry.id == event_id)
            .ok_or_else(|| RelayError::not_found(format!("event {event_id} not found")))?;
        entry
            .properties
            .insert(format!("{organization_id}.enabled"), enabled.to_string());
        Ok(())
    }

    async fn rule_exists(&self, name: EventName) -> Result<bool, RelayError> {
        let inner = self.inner.lock().await;
        Ok(inner.rules.iter().any(|title| title == name.as_str()))
    }

    async fn disable_rules_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<usize, RelayError> {
        let mut inner = self.inner.lock().await;
        let scoped: Vec<String> = inner
            .catalog
            .iter()
            .filter(|entry| {
                entry.properties.get("organizationId") == Some(&organization_id.to_string())
            })
            .map(|entry| entry.title.clone())
            .collect();
        let before = inner.rules.len();
        inner.rules.retain(|title| !scoped.contains(title));
        Ok(before - inner.rules.len())
    }

    async fn cancellation_rules(&self, name: EventName) -> Result<Vec<String>, RelayError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .catalog
            .iter()
            .filter(|entry| entry.cancellers.iter().any(|c| c == name.as_str()))
            .map(|entry| entry.title.clone())
            .collect())
    }

    async fn submit(&self, event: ScoredEvent) -> Result<(), RelayError> {
        self.inner.lock().await.submitted.push(event);
        Ok(())
    }

    async fn submit_cancellation(&self, event: ScoredEvent) -> Result<(), RelayError> {
        self.inner.lock().await.cancelled.push(event);
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
