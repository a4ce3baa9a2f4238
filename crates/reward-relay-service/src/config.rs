//! Service configuration loaded from files and the environment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. `/etc/reward-relay/relay.toml` (optional system-wide file)
//! 3. `config/relay.toml` (optional file relative to the working directory)
//! 4. The file named by `REWARD_RELAY_CONFIG_PATH` (required when set)
//! 5. Environment variables prefixed `REWARD_RELAY`, with `__` as the
//!    section separator, e.g. `REWARD_RELAY__SERVER__PORT=9000`
//!
//! The merged configuration is validated before the service starts; an
//! invalid value is a startup failure, not a runtime surprise.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use reward_relay_core::SignatureScheme;
use reward_relay_github::GithubConfig;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Environment variable naming an explicit configuration file.
///
/// When set, the file must exist; a dangling path is a load error.
pub const CONFIG_PATH_ENV: &str = "REWARD_RELAY_CONFIG_PATH";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "REWARD_RELAY";

const SYSTEM_CONFIG_PATH: &str = "/etc/reward-relay/relay";
const LOCAL_CONFIG_PATH: &str = "config/relay";

// ============================================================================
// Errors
// ============================================================================

/// Failure to assemble a usable service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged configuration holds a value the service cannot run with.
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

// ============================================================================
// Configuration sections
// ============================================================================

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// GitHub API client settings
    pub github: GithubApiConfig,

    /// Delivery queue and worker pool sizing
    pub dispatch: DispatchConfig,

    /// Background reconciliation schedule
    pub reconciliation: ReconciliationConfig,

    /// Log verbosity and output format
    pub logging: LoggingConfig,

    /// Users allowed to call the management API
    pub management: ManagementConfig,

    /// Remote-login to platform-user mappings
    pub identity: IdentityConfig,
}

impl RelayConfig {
    /// Loads and validates the configuration from all layered sources.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(
                File::with_name(SYSTEM_CONFIG_PATH)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(File::with_name(LOCAL_CONFIG_PATH).required(false));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: RelayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port must be non-zero"));
        }
        Url::parse(&self.github.api_base_url).map_err(|err| {
            ConfigError::invalid(format!("github.api_base_url is not a valid URL: {err}"))
        })?;
        Url::parse(&self.github.webhook_callback_url).map_err(|err| {
            ConfigError::invalid(format!(
                "github.webhook_callback_url is not a valid URL: {err}"
            ))
        })?;
        self.github.scheme()?;
        if self.github.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "github.request_timeout_secs must be at least 1",
            ));
        }
        if self.dispatch.queue_depth == 0 {
            return Err(ConfigError::invalid(
                "dispatch.queue_depth must be at least 1",
            ));
        }
        if self.dispatch.workers == 0 {
            return Err(ConfigError::invalid("dispatch.workers must be at least 1"));
        }
        if self.reconciliation.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "reconciliation.interval_secs must be at least 1",
            ));
        }
        if !matches!(
            self.logging.format.to_ascii_lowercase().as_str(),
            "text" | "json"
        ) {
            return Err(ConfigError::invalid(format!(
                "logging.format must be \"text\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// GitHub API client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubApiConfig {
    /// Base URL of the GitHub REST API
    pub api_base_url: String,

    /// Callback URL registered on created webhooks; GitHub posts
    /// deliveries here, so it must be reachable from the outside
    pub webhook_callback_url: String,

    /// Signature scheme for inbound deliveries, `sha1` or `sha256`
    pub signature_scheme: String,

    /// Timeout for individual API requests, in seconds
    pub request_timeout_secs: u64,

    /// Idle connections kept alive per host
    pub pool_max_idle_per_host: usize,
}

impl Default for GithubApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            webhook_callback_url: "http://localhost:8080/webhooks".to_string(),
            signature_scheme: "sha1".to_string(),
            request_timeout_secs: 30,
            pool_max_idle_per_host: 10,
        }
    }
}

impl GithubApiConfig {
    /// Parses the configured signature scheme.
    pub fn scheme(&self) -> Result<SignatureScheme, ConfigError> {
        self.signature_scheme
            .parse()
            .map_err(ConfigError::invalid)
    }

    /// Builds the HTTP client configuration for these settings.
    pub fn client_config(&self) -> GithubConfig {
        GithubConfig::default()
            .with_api_base_url(&self.api_base_url)
            .with_webhook_callback_url(&self.webhook_callback_url)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_pool_max_idle_per_host(self.pool_max_idle_per_host)
    }
}

/// Delivery queue and worker pool sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deliveries held while all workers are busy; beyond this the
    /// intake endpoint answers 500 and GitHub redelivers later
    pub queue_depth: usize,

    /// Concurrent delivery processors
    pub workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            workers: 4,
        }
    }
}

/// Background reconciliation schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Seconds between reconciliation cycles
    pub interval_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

/// Log verbosity and output format.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is unset
    pub level: String,

    /// Output format, `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Whether log lines should be emitted as JSON objects.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Users allowed to call the management API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Forwarded usernames granted manager rights
    pub managers: Vec<String>,
}

/// Remote-login to platform-user mappings.
///
/// Deployments without a directory service can pin the mapping here;
/// unknown logins simply score no points.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Keys are GitHub logins, values are platform usernames
    pub links: HashMap<String, String>,
}
