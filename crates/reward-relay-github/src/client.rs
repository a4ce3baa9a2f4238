//! GitHub REST client for organization webhook management.
//!
//! Calls are authenticated with the per-organization access token handed in
//! by the caller, never with a client-wide credential. Responses are mapped
//! onto the relay's domain types; a 404 from GitHub surfaces as `None` (or
//! an empty listing) rather than an error, matching how the management
//! service distinguishes "gone" from "unreachable".

use async_trait::async_trait;
use rand::RngExt;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use reward_relay_core::{
    CreatedHook, HooksProvider, OrganizationId, RelayError, RemoteHook, RemoteHookId,
    RemoteOrganization, RemoteRepository, RepositoryId, TokenStatus,
};

use crate::config::GithubConfig;

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";

/// Length of the signing secret generated for each created hook.
const SECRET_LENGTH: usize = 8;

/// HTTP client for the GitHub webhook management API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct GithubHooksClient {
    http: reqwest::Client,
    config: GithubConfig,
}

impl GithubHooksClient {
    /// Build a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Connection` if the HTTP client cannot be
    /// constructed.
    pub fn new(config: GithubConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| {
                RelayError::connection(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { http, config })
    }

    fn request(&self, method: Method, url: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {token}"))
            .header("Accept", ACCEPT_GITHUB_JSON)
    }

    /// Send a request and normalize the outcome: 2xx yields the response,
    /// 404 yields `None`, anything else is a connection-level failure
    /// carrying the status and body.
    async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<reqwest::Response>, RelayError> {
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::connection(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::connection(format!(
                "GitHub request failed with {status}: {body}"
            )));
        }

        Ok(Some(response))
    }

    async fn fetch_organization(
        &self,
        reference: &str,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        let url = format!("{}/orgs/{}", self.config.api_base_url, reference);
        let Some(response) = self.dispatch(self.request(Method::GET, &url, token)).await? else {
            return Ok(None);
        };

        let organization = response.json::<OrganizationResponse>().await.map_err(|e| {
            RelayError::connection(format!("failed to parse organization response: {e}"))
        })?;
        Ok(Some(organization.into()))
    }
}

#[async_trait]
impl HooksProvider for GithubHooksClient {
    async fn create_hook(
        &self,
        organization_name: &str,
        events: &[String],
        token: &str,
    ) -> Result<CreatedHook, RelayError> {
        let secret = random_secret(SECRET_LENGTH);
        let body = json!({
            "name": "web",
            "active": true,
            "config": {
                "url": self.config.webhook_callback_url,
                "content_type": "json",
                "insecure_ssl": "0",
                "secret": secret,
            },
            "events": events,
        });

        debug!(organization = organization_name, "registering organization webhook");
        let url = format!("{}/orgs/{}/hooks", self.config.api_base_url, organization_name);
        let response = self
            .dispatch(self.request(Method::POST, &url, token).json(&body))
            .await?
            .ok_or_else(|| {
                RelayError::not_found(format!(
                    "organization {organization_name} wasn't found or the token cannot manage its hooks"
                ))
            })?;

        let hook = response.json::<HookResponse>().await.map_err(|e| {
            RelayError::connection(format!("failed to parse hook creation response: {e}"))
        })?;

        // GitHub replies with the event set it actually accepted; that list,
        // not the requested one, is what the hook will deliver.
        Ok(CreatedHook {
            id: RemoteHookId::new(hook.id),
            secret,
            events: hook.events,
        })
    }

    async fn delete_hook(
        &self,
        organization_id: OrganizationId,
        hook_id: RemoteHookId,
        token: &str,
    ) -> Result<(), RelayError> {
        debug!(%organization_id, %hook_id, "removing organization webhook");
        let url = format!(
            "{}/orgs/{}/hooks/{}",
            self.config.api_base_url, organization_id, hook_id
        );

        // A 404 means the hook is already gone, which is the state we want.
        self.dispatch(self.request(Method::DELETE, &url, token))
            .await
            .map(|_| ())
    }

    async fn get_hook(
        &self,
        organization_id: OrganizationId,
        hook_id: RemoteHookId,
        token: &str,
    ) -> Result<Option<RemoteHook>, RelayError> {
        let url = format!(
            "{}/orgs/{}/hooks/{}",
            self.config.api_base_url, organization_id, hook_id
        );
        let Some(response) = self.dispatch(self.request(Method::GET, &url, token)).await? else {
            return Ok(None);
        };

        let hook = response.json::<HookResponse>().await.map_err(|e| {
            RelayError::connection(format!("failed to parse hook response: {e}"))
        })?;
        Ok(Some(RemoteHook {
            id: RemoteHookId::new(hook.id),
            events: hook.events,
        }))
    }

    async fn get_organization_by_name(
        &self,
        name: &str,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        self.fetch_organization(name, token).await
    }

    async fn get_organization_by_id(
        &self,
        organization_id: OrganizationId,
        token: &str,
    ) -> Result<Option<RemoteOrganization>, RelayError> {
        self.fetch_organization(&organization_id.to_string(), token).await
    }

    async fn list_repositories(
        &self,
        organization_id: OrganizationId,
        page: usize,
        per_page: usize,
        keyword: Option<&str>,
        token: &str,
    ) -> Result<Vec<RemoteRepository>, RelayError> {
        let keyword = keyword.map(str::trim).filter(|keyword| !keyword.is_empty());
        let url = match keyword {
            Some(keyword) => format!(
                "{}/search/repositories?q={}+org:{}&per_page={}&page={}",
                self.config.api_base_url, keyword, organization_id, per_page, page
            ),
            None => format!(
                "{}/orgs/{}/repos?per_page={}&page={}",
                self.config.api_base_url, organization_id, per_page, page
            ),
        };

        let Some(response) = self.dispatch(self.request(Method::GET, &url, token)).await? else {
            return Ok(Vec::new());
        };

        let repositories = if keyword.is_some() {
            response
                .json::<SearchResponse>()
                .await
                .map_err(|e| {
                    RelayError::connection(format!("failed to parse search response: {e}"))
                })?
                .items
        } else {
            response.json::<Vec<RepositoryResponse>>().await.map_err(|e| {
                RelayError::connection(format!("failed to parse repository listing: {e}"))
            })?
        };

        Ok(repositories.into_iter().map(Into::into).collect())
    }

    async fn count_repositories(
        &self,
        organization_id: OrganizationId,
        token: &str,
    ) -> Result<usize, RelayError> {
        let url = format!("{}/orgs/{}/repos", self.config.api_base_url, organization_id);
        let Some(response) = self.dispatch(self.request(Method::GET, &url, token)).await? else {
            return Ok(0);
        };

        let repositories = response.json::<Vec<serde_json::Value>>().await.map_err(|e| {
            RelayError::connection(format!("failed to parse repository listing: {e}"))
        })?;
        Ok(repositories.len())
    }

    async fn token_status(&self, token: &str) -> Result<TokenStatus, RelayError> {
        let url = format!("{}/rate_limit", self.config.api_base_url);
        let response = self
            .request(Method::GET, &url, token)
            .send()
            .await
            .map_err(|e| RelayError::connection(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(TokenStatus::invalid());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::connection(format!(
                "token check failed with {status}: {body}"
            )));
        }

        let parsed = response.json::<RateLimitResponse>().await.map_err(|e| {
            RelayError::connection(format!("failed to parse rate limit response: {e}"))
        })?;
        Ok(TokenStatus {
            valid: true,
            remaining: Some(parsed.resources.core.remaining),
            reset: Some(parsed.resources.core.reset),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct HookResponse {
    id: i64,
    #[serde(default)]
    events: Vec<String>,
}

#[derive(Deserialize)]
struct OrganizationResponse {
    id: OrganizationId,
    login: String,
    name: Option<String>,
    description: Option<String>,
    avatar_url: Option<String>,
}

impl From<OrganizationResponse> for RemoteOrganization {
    fn from(response: OrganizationResponse) -> Self {
        let title = response
            .name
            .unwrap_or_else(|| response.login.clone());
        Self {
            id: response.id,
            name: response.login,
            title,
            description: response.description.unwrap_or_default(),
            avatar_url: response.avatar_url.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct RepositoryResponse {
    id: RepositoryId,
    name: String,
    description: Option<String>,
}

impl From<RepositoryResponse> for RemoteRepository {
    fn from(response: RepositoryResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            description: response.description,
            enabled: false,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Vec<RepositoryResponse>,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Deserialize)]
struct RateLimitResources {
    core: RateLimitWindow,
}

#[derive(Deserialize)]
struct RateLimitWindow {
    remaining: u64,
    reset: u64,
}

/// Generate a webhook signing secret of ASCII letters.
fn random_secret(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let base = if rng.random::<bool>() { b'A' } else { b'a' };
            (base + rng.random_range(0..26u8)) as char
        })
        .collect()
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
