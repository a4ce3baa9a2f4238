//! Webhook registration management.
//!
//! Everything an operator does through the management API lands here:
//! watching an organization, rotating its token, unwatching it, gating
//! repositories, and flipping per-organization event switches. Every
//! operation authorizes the acting user against the manager directory before
//! touching state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::authz::ManagerDirectory;
use crate::engine::RewardEngine;
use crate::error::RelayError;
use crate::gate::RepositoryGate;
use crate::model::{
    HookId, OrganizationId, RemoteHookId, RemoteRepository, RepositoryId, TokenStatus,
    WebhookRegistration,
};
use crate::plugin::TriggerRegistry;
use crate::provider::HooksProvider;
use crate::reconcile::Reconciler;
use crate::store::WebhookStore;

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;

/// Management view of one registration: the stored fields plus remote
/// organization enrichment and the live token status. Credentials never
/// appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSummary {
    pub id: HookId,
    pub webhook_id: RemoteHookId,
    pub organization_id: OrganizationId,
    pub organization_name: String,
    /// Remote display title; absent when the token cannot reach the
    /// provider.
    pub title: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub triggers: Vec<String>,
    pub enabled: bool,
    pub watched_date: DateTime<Utc>,
    pub watched_by: String,
    pub updated_date: DateTime<Utc>,
    pub refresh_date: DateTime<Utc>,
    pub watch_limited: bool,
    pub token_status: TokenStatus,
}

/// Operator-facing webhook management.
pub struct HookService {
    store: Arc<dyn WebhookStore>,
    provider: Arc<dyn HooksProvider>,
    gate: Arc<RepositoryGate>,
    engine: Arc<dyn RewardEngine>,
    managers: Arc<dyn ManagerDirectory>,
    reconciler: Arc<Reconciler>,
    registry: TriggerRegistry,
}

impl HookService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn WebhookStore>,
        provider: Arc<dyn HooksProvider>,
        gate: Arc<RepositoryGate>,
        engine: Arc<dyn RewardEngine>,
        managers: Arc<dyn ManagerDirectory>,
        reconciler: Arc<Reconciler>,
        registry: TriggerRegistry,
    ) -> Self {
        Self {
            store,
            provider,
            gate,
            engine,
            managers,
            reconciler,
            registry,
        }
    }

    async fn authorize(&self, user: &str) -> Result<(), RelayError> {
        if user.is_empty() || !self.managers.is_manager(user).await? {
            return Err(RelayError::unauthorized(
                "the user is not authorized to manage webhooks",
            ));
        }
        Ok(())
    }

    /// Page through registrations as management summaries. A `limit` of zero
    /// means no limit.
    pub async fn list_hooks(
        &self,
        user: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<HookSummary>, RelayError> {
        self.authorize(user).await?;
        let hooks = self.store.list(offset, limit).await?;
        let mut summaries = Vec::with_capacity(hooks.len());
        for hook in &hooks {
            summaries.push(self.summarize(hook).await?);
        }
        Ok(summaries)
    }

    pub async fn count_hooks(&self, user: &str) -> Result<usize, RelayError> {
        self.authorize(user).await?;
        self.store.count().await
    }

    pub async fn get_hook(&self, user: &str, id: HookId) -> Result<HookSummary, RelayError> {
        self.authorize(user).await?;
        if id.value() <= 0 {
            return Err(RelayError::invalid_argument("webhook id is mandatory"));
        }
        let hook = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RelayError::not_found("webhook doesn't exist"))?;
        self.summarize(&hook).await
    }

    /// Watch an organization: verify the token, resolve the organization,
    /// register the remote hook, and store the registration.
    pub async fn create_hook(
        &self,
        user: &str,
        organization_name: &str,
        access_token: &str,
    ) -> Result<HookSummary, RelayError> {
        self.authorize(user).await?;
        if organization_name.trim().is_empty() {
            return Err(RelayError::invalid_argument("organization name is mandatory"));
        }
        if access_token.trim().is_empty() {
            return Err(RelayError::invalid_argument("access token is mandatory"));
        }

        let status = self.provider.token_status(access_token).await?;
        if !status.valid {
            return Err(RelayError::unauthorized("token expired or invalid"));
        }
        if status.remaining == Some(0) {
            return Err(RelayError::unauthorized("token rate limit reached"));
        }

        let organization = self
            .provider
            .get_organization_by_name(organization_name, access_token)
            .await?
            .ok_or_else(|| {
                RelayError::not_found(format!("organization {organization_name} not found"))
            })?;

        if let Some(existing) = self.store.find_by_organization(organization.id).await? {
            return Err(RelayError::Conflict {
                existing: Box::new(existing),
            });
        }

        let requested = self.registry.trigger_names();
        let created = self
            .provider
            .create_hook(&organization.name, &requested, access_token)
            .await?;

        // The provider may accept a subset of the requested events; the
        // registration records what it actually subscribed to.
        let now = Utc::now();
        let saved = self
            .store
            .save(WebhookRegistration {
                id: HookId::new(0),
                webhook_id: created.id,
                organization_id: organization.id,
                organization_name: organization.name.clone(),
                triggers: created.events,
                enabled: true,
                watched_date: now,
                watched_by: user.to_string(),
                updated_date: now,
                refresh_date: now,
                secret: created.secret,
                token: access_token.to_string(),
            })
            .await?;
        info!(organization = %saved.organization_name, by = %user, "organization watched");
        self.summarize(&saved).await
    }

    /// Swap the stored access token of a registration.
    pub async fn update_token(
        &self,
        user: &str,
        id: HookId,
        access_token: &str,
    ) -> Result<(), RelayError> {
        self.authorize(user).await?;
        if id.value() <= 0 {
            return Err(RelayError::invalid_argument("webhook id must be positive"));
        }
        if access_token.trim().is_empty() {
            return Err(RelayError::invalid_argument("access token is mandatory"));
        }
        let hook = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| RelayError::not_found(format!("webhook with id {id} wasn't found")))?;

        self.store.update_token(id, access_token).await?;
        // The old token's cached status is stale now
        self.provider
            .invalidate(hook.organization_id, &hook.token)
            .await;
        info!(organization = %hook.organization_name, by = %user, "access token rotated");
        Ok(())
    }

    /// Unwatch an organization: delete the remote hook, drop the
    /// registration, and switch off the rules scoped to it.
    pub async fn delete_hook(
        &self,
        user: &str,
        organization_id: OrganizationId,
    ) -> Result<(), RelayError> {
        self.authorize(user).await?;
        let hook = self
            .store
            .find_by_organization(organization_id)
            .await?
            .ok_or_else(|| {
                RelayError::not_found(format!(
                    "hook for organization {organization_id} wasn't found"
                ))
            })?;

        let remote = self
            .provider
            .delete_hook(organization_id, hook.webhook_id, &hook.token)
            .await;
        // Cached state for this hook is stale whether or not the delete
        // landed
        self.provider.invalidate(organization_id, &hook.token).await;
        remote?;

        self.store.delete(hook.id).await?;
        match self.engine.disable_rules_for_organization(organization_id).await {
            Ok(disabled) if disabled > 0 => {
                info!(%organization_id, disabled, "switched off rules of the unwatched organization");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%organization_id, error = %e, "could not switch off the organization's rules");
            }
        }
        info!(organization = %hook.organization_name, by = %user, "organization unwatched");
        Ok(())
    }

    /// List an organization's repositories, each flagged with its gate
    /// state.
    pub async fn repositories(
        &self,
        user: &str,
        organization_id: OrganizationId,
        page: usize,
        per_page: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<RemoteRepository>, RelayError> {
        self.authorize(user).await?;
        let hook = self
            .store
            .find_by_organization(organization_id)
            .await?
            .ok_or_else(|| {
                RelayError::not_found(format!(
                    "hook for organization {organization_id} wasn't found"
                ))
            })?;

        let mut repositories = self
            .provider
            .list_repositories(organization_id, page, per_page, keyword, &hook.token)
            .await?;
        for repository in &mut repositories {
            repository.enabled = self
                .gate
                .is_repository_enabled(organization_id, repository.id)
                .await?;
        }
        Ok(repositories)
    }

    pub async fn count_repositories(
        &self,
        user: &str,
        organization_id: OrganizationId,
    ) -> Result<usize, RelayError> {
        self.authorize(user).await?;
        let hook = self
            .store
            .find_by_organization(organization_id)
            .await?
            .ok_or_else(|| {
                RelayError::not_found(format!(
                    "hook for organization {organization_id} wasn't found"
                ))
            })?;
        self.provider
            .count_repositories(organization_id, &hook.token)
            .await
    }

    pub async fn set_repository_enabled(
        &self,
        user: &str,
        organization_id: OrganizationId,
        repository_id: RepositoryId,
        enabled: bool,
    ) -> Result<(), RelayError> {
        self.authorize(user).await?;
        self.gate
            .set_repository_enabled(organization_id, repository_id, enabled)
            .await?;
        info!(%organization_id, %repository_id, enabled, by = %user, "repository gate updated");
        Ok(())
    }

    /// Flip an event's per-organization switch in the engine catalog.
    pub async fn set_event_enabled(
        &self,
        user: &str,
        event_id: i64,
        organization_id: OrganizationId,
        enabled: bool,
    ) -> Result<(), RelayError> {
        self.authorize(user).await?;
        self.engine
            .set_event_enabled(event_id, organization_id, enabled)
            .await?;
        info!(event_id, %organization_id, enabled, by = %user, "event switch updated");
        Ok(())
    }

    pub async fn set_watch_limited(
        &self,
        user: &str,
        organization_id: OrganizationId,
        enabled: bool,
    ) -> Result<(), RelayError> {
        self.authorize(user).await?;
        self.gate.set_watch_limited(organization_id, enabled).await?;
        info!(%organization_id, enabled, by = %user, "watch scope updated");
        Ok(())
    }

    /// Run a reconciliation cycle now. Returns once the cycle finishes; if
    /// one is already running, that cycle's work covers this request.
    pub async fn force_refresh(&self, user: &str) -> Result<(), RelayError> {
        self.authorize(user).await?;
        self.reconciler.run_cycle().await?;
        Ok(())
    }

    async fn summarize(&self, hook: &WebhookRegistration) -> Result<HookSummary, RelayError> {
        let token_status = self.provider.token_status(&hook.token).await?;
        let organization = if token_status.is_usable() {
            self.provider
                .get_organization_by_id(hook.organization_id, &hook.token)
                .await?
        } else {
            None
        };
        let watch_limited = self.gate.is_watch_limited(hook.organization_id).await?;

        Ok(HookSummary {
            id: hook.id,
            webhook_id: hook.webhook_id,
            organization_id: hook.organization_id,
            organization_name: hook.organization_name.clone(),
            title: organization.as_ref().map(|org| org.title.clone()),
            description: organization.as_ref().map(|org| org.description.clone()),
            avatar_url: organization.as_ref().map(|org| org.avatar_url.clone()),
            triggers: hook.triggers.clone(),
            enabled: hook.enabled,
            watched_date: hook.watched_date,
            watched_by: hook.watched_by.clone(),
            updated_date: hook.updated_date,
            refresh_date: hook.refresh_date,
            watch_limited,
            token_status,
        })
    }
}
