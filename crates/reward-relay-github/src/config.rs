//! Configuration for the GitHub REST client.

use std::time::Duration;

/// Connection settings for `GithubHooksClient`.
///
/// # Examples
///
/// ```
/// use reward_relay_github::GithubConfig;
/// use std::time::Duration;
///
/// let config = GithubConfig::default()
///     .with_webhook_callback_url("https://relay.example.com/webhooks")
///     .with_request_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.api_base_url, "https://api.github.com");
/// ```
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// GitHub API base URL
    pub api_base_url: String,
    /// Public callback URL registered on every created hook
    pub webhook_callback_url: String,
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout duration
    pub request_timeout: Duration,
    /// Idle connections kept per remote host
    pub pool_max_idle_per_host: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            webhook_callback_url: "http://localhost:8080/webhooks".to_string(),
            user_agent: "reward-relay/0.1.0".to_string(),
            request_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
        }
    }
}

impl GithubConfig {
    /// Set the GitHub API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the callback URL registered on created hooks.
    pub fn with_webhook_callback_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_callback_url = url.into();
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the idle connection cap per remote host.
    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
