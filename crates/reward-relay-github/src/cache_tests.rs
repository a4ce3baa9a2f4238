use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reward_relay_core::RepositoryId;

// ============================================================================
// Counting fake provider
// ============================================================================

#[derive(Default)]
struct CountingProvider {
    organization_lookups: AtomicUsize,
    name_lookups: AtomicUsize,
    repository_listings: AtomicUsize,
    token_checks: AtomicUsize,
    count_requests: AtomicUsize,
    organization_failures_left: AtomicUsize,
    fail_deletions: bool,
    lookup_delay: Duration,
}

fn organization(organization_id: OrganizationId) -> RemoteOrganization {
    RemoteOrganization {
        id: organization_id,
        name: "acme".to_string(),
        title: "Acme Inc".to_string(),
        description: String::new(),
        avatar_url: String::new(),
    }
}

#[async_trait]
impl HooksProvider for CountingProvider {
    async fn create_hook(
        &self,
        _organization_name: &str,
        events: &[String],
        _token: &str,
    ) -> Result<CreatedHook, RelayError> {
        Ok(CreatedHook {
            id: RemoteHookId::new(1),
            secret: "abcdefgh".to_string(),
            events: events.to_vec(),
        })
    }

    async fn delete_hook(
        &self,
        _organization_id: OrganizationId,
        _hook_id: RemoteHookId,
        _token: &str,
    ) -> Result<(), RelayError> {
        if self.fail_deletions {
            Err(RelayError::connection("provider unreachable"))
        } else {
            Ok(())
        }
    }

    async fn get_hook(
        &self,
        _organization_id: OrganizationId,
        _hook_id: RemoteHookId,
        _token: &str,
    ) -> Result<Option<RemoteHook>, RelayError> {
        Ok(None)
    }

    async fn get_organization_by_name(
        &self,
        _name: &str,
        _token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(organization(OrganizationId::new(77))))
    }

    async fn get_organization_by_id(
        &self,
        organization_id: OrganizationId,
        _token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        self.organization_lookups.fetch_add(1, Ordering::SeqCst);
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        let failures = self.organization_failures_left.load(Ordering::SeqCst);
        if failures > 0 {
            self.organization_failures_left.store(failures - 1, Ordering::SeqCst);
            return Err(RelayError::connection("provider unreachable"));
        }
        Ok(Some(organization(organization_id)))
    }

    async fn list_repositories(
        &self,
        _organization_id: OrganizationId,
        page: usize,
        _per_page: usize,
        _keyword: Option<&str>,
        _token: &str,
    ) -> Result<Vec<RemoteRepository>, RelayError> {
        self.repository_listings.fetch_add(1, Ordering::SeqCst);
        Ok(vec![RemoteRepository {
            id: RepositoryId::new(page as i64),
            name: format!("repo-{page}"),
            description: None,
            enabled: false,
        }])
    }

    async fn count_repositories(
        &self,
        _organization_id: OrganizationId,
        _token: &str,
    ) -> Result<usize, RelayError> {
        self.count_requests.fetch_add(1, Ordering::SeqCst);
        Ok(3)
    }

    async fn token_status(&self, _token: &str) -> Result<TokenStatus, RelayError> {
        self.token_checks.fetch_add(1, Ordering::SeqCst);
        Ok(TokenStatus {
            valid: true,
            remaining: Some(100),
            reset: None,
        })
    }
}

fn cached(provider: &Arc<CountingProvider>) -> CachedHooksProvider {
    let inner: Arc<dyn HooksProvider> = provider.clone();
    CachedHooksProvider::new(inner)
}

// ============================================================================
// Caching behavior
// ============================================================================

#[tokio::test]
async fn test_organization_lookups_are_cached_per_credential() {
    let provider = Arc::new(CountingProvider::default());
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    let first = cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("lookup should succeed");
    let second = cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("lookup should succeed");

    assert_eq!(first, second);
    assert_eq!(provider.organization_lookups.load(Ordering::SeqCst), 1);

    cache
        .get_organization_by_id(organization_id, "ghp_b")
        .await
        .expect("lookup should succeed");

    assert_eq!(
        provider.organization_lookups.load(Ordering::SeqCst),
        2,
        "a different token is a different cache entry"
    );
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_fetch() {
    let provider = Arc::new(CountingProvider {
        lookup_delay: Duration::from_millis(50),
        ..Default::default()
    });
    let cache = Arc::new(cached(&provider));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.get_organization_by_id(OrganizationId::new(77), "ghp_a").await
        }));
    }
    for handle in handles {
        let organization = handle
            .await
            .expect("task should not panic")
            .expect("lookup should succeed");
        assert!(organization.is_some());
    }

    assert_eq!(
        provider.organization_lookups.load(Ordering::SeqCst),
        1,
        "concurrent lookups should share a single remote fetch"
    );
}

#[tokio::test]
async fn test_failed_lookups_are_not_cached() {
    let provider = Arc::new(CountingProvider {
        organization_failures_left: AtomicUsize::new(1),
        ..Default::default()
    });
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect_err("the first lookup should fail");

    let organization = cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("the retry should reach the provider");

    assert!(organization.is_some());
    assert_eq!(provider.organization_lookups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_token_status_is_cached_until_invalidated() {
    let provider = Arc::new(CountingProvider::default());
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    cache.token_status("ghp_a").await.expect("check should succeed");
    cache.token_status("ghp_a").await.expect("check should succeed");
    assert_eq!(provider.token_checks.load(Ordering::SeqCst), 1);

    cache.invalidate(organization_id, "ghp_a").await;

    cache.token_status("ghp_a").await.expect("check should succeed");
    assert_eq!(provider.token_checks.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_delete_hook_always_drops_the_cached_credential_state() {
    let provider = Arc::new(CountingProvider {
        fail_deletions: true,
        ..Default::default()
    });
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("lookup should succeed");
    cache.token_status("ghp_a").await.expect("check should succeed");

    cache
        .delete_hook(organization_id, RemoteHookId::new(42), "ghp_a")
        .await
        .expect_err("the deletion should fail");

    cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("lookup should succeed");
    cache.token_status("ghp_a").await.expect("check should succeed");

    assert_eq!(
        provider.organization_lookups.load(Ordering::SeqCst),
        2,
        "a failed deletion should still drop the cached organization"
    );
    assert_eq!(
        provider.token_checks.load(Ordering::SeqCst),
        2,
        "a failed deletion should still drop the cached token status"
    );
}

#[tokio::test]
async fn test_repository_pages_cache_independently() {
    let provider = Arc::new(CountingProvider::default());
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    cache
        .list_repositories(organization_id, 1, 10, None, "ghp_a")
        .await
        .expect("listing should succeed");
    cache
        .list_repositories(organization_id, 2, 10, None, "ghp_a")
        .await
        .expect("listing should succeed");
    cache
        .list_repositories(organization_id, 1, 10, None, "ghp_a")
        .await
        .expect("listing should succeed");
    assert_eq!(provider.repository_listings.load(Ordering::SeqCst), 2);

    cache
        .list_repositories(organization_id, 1, 10, Some("widget"), "ghp_a")
        .await
        .expect("listing should succeed");
    assert_eq!(
        provider.repository_listings.load(Ordering::SeqCst),
        3,
        "a keyword search is a separate cache entry"
    );
}

#[tokio::test]
async fn test_uncached_lookups_always_reach_the_provider() {
    let provider = Arc::new(CountingProvider::default());
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    cache
        .get_organization_by_name("acme", "ghp_a")
        .await
        .expect("lookup should succeed");
    cache
        .get_organization_by_name("acme", "ghp_a")
        .await
        .expect("lookup should succeed");
    assert_eq!(provider.name_lookups.load(Ordering::SeqCst), 2);

    cache
        .count_repositories(organization_id, "ghp_a")
        .await
        .expect("count should succeed");
    cache
        .count_repositories(organization_id, "ghp_a")
        .await
        .expect("count should succeed");
    assert_eq!(provider.count_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_clear_cache_forgets_everything() {
    let provider = Arc::new(CountingProvider::default());
    let cache = cached(&provider);
    let organization_id = OrganizationId::new(77);

    cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("lookup should succeed");
    cache
        .list_repositories(organization_id, 1, 10, None, "ghp_a")
        .await
        .expect("listing should succeed");
    cache.token_status("ghp_a").await.expect("check should succeed");

    cache.clear_cache().await;

    cache
        .get_organization_by_id(organization_id, "ghp_a")
        .await
        .expect("lookup should succeed");
    cache
        .list_repositories(organization_id, 1, 10, None, "ghp_a")
        .await
        .expect("listing should succeed");
    cache.token_status("ghp_a").await.expect("check should succeed");

    assert_eq!(provider.organization_lookups.load(Ordering::SeqCst), 2);
    assert_eq!(provider.repository_listings.load(Ordering::SeqCst), 2);
    assert_eq!(provider.token_checks.load(Ordering::SeqCst), 2);
}
