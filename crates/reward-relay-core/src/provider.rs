//! Remote hooks provider seam.
//!
//! Everything the relay asks of the provider's REST API goes through this
//! trait: hook lifecycle, organization and repository metadata, and
//! credential checks. The `reward-relay-github` crate carries the HTTP
//! implementation and a caching decorator; core code and tests only see the
//! trait.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::model::{
    OrganizationId, RemoteHook, RemoteHookId, RemoteOrganization, RemoteRepository, TokenStatus,
};

/// Result of registering a hook remotely: the provider-assigned id, the
/// signing secret generated for it, and the event types the provider accepted
/// (which may differ from the requested set). The secret exists only here and
/// in the store; it is never readable from the provider again.
#[derive(Clone, PartialEq, Eq)]
pub struct CreatedHook {
    pub id: RemoteHookId,
    pub secret: String,
    pub events: Vec<String>,
}

impl std::fmt::Debug for CreatedHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedHook")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .field("events", &self.events)
            .finish()
    }
}

#[async_trait]
pub trait HooksProvider: Send + Sync {
    /// Register a webhook on an organization, subscribed to the given event
    /// types and pointed at the relay's callback URL.
    async fn create_hook(
        &self,
        organization_name: &str,
        events: &[String],
        token: &str,
    ) -> Result<CreatedHook, RelayError>;

    /// Remove a hook remotely. Deleting a hook the provider no longer knows
    /// succeeds; the goal state is reached either way.
    async fn delete_hook(
        &self,
        organization_id: OrganizationId,
        hook_id: RemoteHookId,
        token: &str,
    ) -> Result<(), RelayError>;

    /// Fetch a hook's current remote state. `None` when the provider no
    /// longer knows the hook.
    async fn get_hook(
        &self,
        organization_id: OrganizationId,
        hook_id: RemoteHookId,
        token: &str,
    ) -> Result<Option<RemoteHook>, RelayError>;

    async fn get_organization_by_name(
        &self,
        name: &str,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError>;

    async fn get_organization_by_id(
        &self,
        organization_id: OrganizationId,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError>;

    /// Page through an organization's repositories, optionally narrowed by a
    /// search keyword.
    async fn list_repositories(
        &self,
        organization_id: OrganizationId,
        page: usize,
        per_page: usize,
        keyword: Option<&str>,
        token: &str,
    ) -> Result<Vec<RemoteRepository>, RelayError>;

    /// Count an organization's repositories.
    async fn count_repositories(
        &self,
        organization_id: OrganizationId,
        token: &str,
    ) -> Result<usize, RelayError>;

    /// Check a credential against the provider and report its remaining call
    /// budget.
    async fn token_status(&self, token: &str) -> Result<TokenStatus, RelayError>;

    /// Drop any cached state tied to one organization and credential. A
    /// no-op on uncached implementations.
    async fn invalidate(&self, _organization_id: OrganizationId, _token: &str) {}

    /// Drop all cached state. A no-op on uncached implementations.
    async fn clear_cache(&self) {}
}
