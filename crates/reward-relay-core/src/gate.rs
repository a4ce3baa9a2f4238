//! Per-repository delivery gating.
//!
//! Operators can switch individual repositories of a watched organization off
//! without touching the remote hook subscription. The disabled set is kept in
//! the settings store as a colon-joined id list per organization, so an empty
//! store means everything is enabled.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RelayError;
use crate::model::{OrganizationId, RepositoryId};
use crate::payload::WebhookPayload;

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;

/// Scope holding the colon-joined disabled repository ids, keyed by
/// organization id.
pub const DISABLED_REPOS_SCOPE: &str = "disabledRepos";

/// Scope holding the per-organization watch-limit flag, keyed by
/// organization id.
pub const WATCH_LIMITED_SCOPE: &str = "watchLimited";

/// Small scoped key-value store for operator settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>, RelayError>;

    async fn put(&self, scope: &str, key: &str, value: String) -> Result<(), RelayError>;

    async fn remove(&self, scope: &str, key: &str) -> Result<(), RelayError>;
}

/// In-memory settings store for testing and development.
#[derive(Default)]
pub struct MemorySettingsStore {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<String>, RelayError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(scope.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, scope: &str, key: &str, value: String) -> Result<(), RelayError> {
        let mut entries = self.entries.write().await;
        entries.insert((scope.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, scope: &str, key: &str) -> Result<(), RelayError> {
        let mut entries = self.entries.write().await;
        entries.remove(&(scope.to_string(), key.to_string()));
        Ok(())
    }
}

/// Decides whether deliveries from a repository may proceed.
pub struct RepositoryGate {
    settings: Arc<dyn SettingsStore>,
}

impl RepositoryGate {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Whether a payload may proceed to classification. Payloads that do not
    /// carry both an organization and a repository id cannot be gated and
    /// pass through.
    pub async fn allows(&self, payload: &WebhookPayload) -> Result<bool, RelayError> {
        match (payload.organization_id(), payload.repository_id()) {
            (Some(org), Some(repo)) => self.is_repository_enabled(org, repo).await,
            _ => Ok(true),
        }
    }

    pub async fn is_repository_enabled(
        &self,
        organization_id: OrganizationId,
        repository_id: RepositoryId,
    ) -> Result<bool, RelayError> {
        let disabled = self.disabled_repositories(organization_id).await?;
        Ok(!disabled.contains(&repository_id))
    }

    /// Flip the gate for one repository. Enabling a repository that is not
    /// disabled, or disabling one twice, is a no-op.
    pub async fn set_repository_enabled(
        &self,
        organization_id: OrganizationId,
        repository_id: RepositoryId,
        enabled: bool,
    ) -> Result<(), RelayError> {
        let mut disabled = self.disabled_repositories(organization_id).await?;
        if enabled {
            disabled.retain(|id| *id != repository_id);
        } else if !disabled.contains(&repository_id) {
            disabled.push(repository_id);
        }

        let key = organization_id.to_string();
        if disabled.is_empty() {
            self.settings.remove(DISABLED_REPOS_SCOPE, &key).await
        } else {
            let joined = disabled
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(":");
            self.settings.put(DISABLED_REPOS_SCOPE, &key, joined).await
        }
    }

    /// The repositories currently switched off for an organization. Entries
    /// that fail to parse are skipped rather than failing the lookup.
    pub async fn disabled_repositories(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<RepositoryId>, RelayError> {
        let value = self
            .settings
            .get(DISABLED_REPOS_SCOPE, &organization_id.to_string())
            .await?;
        Ok(value
            .map(|joined| {
                joined
                    .split(':')
                    .filter_map(|id| id.parse::<i64>().ok())
                    .map(RepositoryId::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Whether hook creation for an organization is limited to the watching
    /// operator's scope. On by default until an operator widens it.
    pub async fn is_watch_limited(
        &self,
        organization_id: OrganizationId,
    ) -> Result<bool, RelayError> {
        let value = self
            .settings
            .get(WATCH_LIMITED_SCOPE, &organization_id.to_string())
            .await?;
        Ok(value.map(|v| v == "true").unwrap_or(true))
    }

    pub async fn set_watch_limited(
        &self,
        organization_id: OrganizationId,
        enabled: bool,
    ) -> Result<(), RelayError> {
        self.settings
            .put(
                WATCH_LIMITED_SCOPE,
                &organization_id.to_string(),
                enabled.to_string(),
            )
            .await
    }
}
