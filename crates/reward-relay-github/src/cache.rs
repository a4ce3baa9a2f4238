//! Caching decorator for `HooksProvider` lookups.
//!
//! Reads that the relay issues repeatedly while summarizing hooks are cached
//! per access token: the organization profile, repository pages, and the
//! token's rate-limit status. Everything else passes straight through.
//! Entries never expire on their own; the reconciliation loop calls
//! `clear_cache` at the start of every cycle so each pass sees fresh remote
//! state, and credential rotation or hook deletion drops the affected
//! entries immediately.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use reward_relay_core::{
    CreatedHook, HooksProvider, OrganizationId, RelayError, RemoteHook, RemoteHookId,
    RemoteOrganization, RemoteRepository, TokenStatus,
};

/// A keyed cache where concurrent loads of the same key are collapsed into
/// one in-flight computation. Failed loads cache nothing, so the next caller
/// retries.
pub struct SingleFlight<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> SingleFlight<K, V> {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached entry.
    pub async fn clear(&self) {
        self.cells.lock().await.clear();
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Return the value for `key`, running `load` to fill it when absent.
    /// Callers arriving while a load is in flight await that load instead of
    /// starting their own.
    pub async fn get_or_load<F, Fut>(&self, key: K, load: F) -> Result<V, RelayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, RelayError>>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            Arc::clone(cells.entry(key).or_default())
        };
        cell.get_or_try_init(load).await.map(|value| value.clone())
    }

    /// Drop the entry for `key`, if any.
    pub async fn invalidate(&self, key: &K) {
        self.cells.lock().await.remove(key);
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// Cache keys embed the access token that performed the lookup; they carry no
// Debug impl and must stay out of log output.

#[derive(Clone, PartialEq, Eq, Hash)]
struct OrganizationKey {
    organization_id: OrganizationId,
    token: String,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct RepositoryPageKey {
    organization_id: OrganizationId,
    page: usize,
    per_page: usize,
    keyword: Option<String>,
    token: String,
}

/// Caching wrapper around another `HooksProvider`.
///
/// Mutations (hook creation and deletion) always reach the inner provider;
/// deletion additionally drops the cached state for the credential involved,
/// whether or not the remote call succeeded.
pub struct CachedHooksProvider {
    inner: Arc<dyn HooksProvider>,
    organizations: SingleFlight<OrganizationKey, Option<RemoteOrganization>>,
    repositories: SingleFlight<RepositoryPageKey, Vec<RemoteRepository>>,
    token_statuses: SingleFlight<String, TokenStatus>,
}

impl CachedHooksProvider {
    pub fn new(inner: Arc<dyn HooksProvider>) -> Self {
        Self {
            inner,
            organizations: SingleFlight::new(),
            repositories: SingleFlight::new(),
            token_statuses: SingleFlight::new(),
        }
    }
}

#[async_trait]
impl HooksProvider for CachedHooksProvider {
    async fn create_hook(
        &self,
        organization_name: &str,
        events: &[String],
        token: &str,
    ) -> Result<CreatedHook, RelayError> {
        self.inner.create_hook(organization_name, events, token).await
    }

    async fn delete_hook(
        &self,
        organization_id: OrganizationId,
        hook_id: RemoteHookId,
        token: &str,
    ) -> Result<(), RelayError> {
        let result = self.inner.delete_hook(organization_id, hook_id, token).await;
        // Even a failed deletion may have altered remote state; the cached
        // entries for this credential cannot be trusted afterwards.
        self.invalidate(organization_id, token).await;
        result
    }

    async fn get_hook(
        &self,
        organization_id: OrganizationId,
        hook_id: RemoteHookId,
        token: &str,
    ) -> Result<Option<RemoteHook>, RelayError> {
        self.inner.get_hook(organization_id, hook_id, token).await
    }

    async fn get_organization_by_name(
        &self,
        name: &str,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        self.inner.get_organization_by_name(name, token).await
    }

    async fn get_organization_by_id(
        &self,
        organization_id: OrganizationId,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        let key = OrganizationKey {
            organization_id,
            token: token.to_string(),
        };
        self.organizations
            .get_or_load(key, || self.inner.get_organization_by_id(organization_id, token))
            .await
    }

    async fn list_repositories(
        &self,
        organization_id: OrganizationId,
        page: usize,
        per_page: usize,
        keyword: Option<&str>,
        token: &str,
    ) -> Result<Vec<RemoteRepository>, RelayError> {
        let key = RepositoryPageKey {
            organization_id,
            page,
            per_page,
            keyword: keyword.map(str::to_string),
            token: token.to_string(),
        };
        self.repositories
            .get_or_load(key, || {
                self.inner
                    .list_repositories(organization_id, page, per_page, keyword, token)
            })
            .await
    }

    async fn count_repositories(
        &self,
        organization_id: OrganizationId,
        token: &str,
    ) -> Result<usize, RelayError> {
        self.inner.count_repositories(organization_id, token).await
    }

    async fn token_status(&self, token: &str) -> Result<TokenStatus, RelayError> {
        self.token_statuses
            .get_or_load(token.to_string(), || self.inner.token_status(token))
            .await
    }

    async fn invalidate(&self, organization_id: OrganizationId, token: &str) {
        let key = OrganizationKey {
            organization_id,
            token: token.to_string(),
        };
        self.organizations.invalidate(&key).await;
        self.token_statuses.invalidate(&token.to_string()).await;
    }

    async fn clear_cache(&self) {
        self.organizations.clear().await;
        self.repositories.clear().await;
        self.token_statuses.clear().await;
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
