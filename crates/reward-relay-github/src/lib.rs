//! # Reward-Relay GitHub
//!
//! GitHub REST integration for the reward relay: the concrete
//! `HooksProvider` that manages organization webhooks through the GitHub
//! API, plus a caching decorator that collapses repeated lookups.
//!
//! This crate provides:
//! - `GithubHooksClient`: webhook registration, deletion, and inspection
//!   against `api.github.com` (or any compatible base URL)
//! - Organization, repository, and rate-limit lookups keyed by the access
//!   token that performed them
//! - `CachedHooksProvider`: a decorator that deduplicates concurrent
//!   lookups and is dropped wholesale at the start of each reconciliation
//!   cycle
//!
//! # Examples
//!
//! ```rust,no_run
//! use reward_relay_github::{GithubConfig, GithubHooksClient};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), reward_relay_core::RelayError> {
//! let config = GithubConfig::default()
//!     .with_webhook_callback_url("https://relay.example.com/webhooks")
//!     .with_request_timeout(Duration::from_secs(10));
//! let client = GithubHooksClient::new(config)?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod cache;
pub mod client;
pub mod config;

// Re-export commonly used types at crate root for convenience
pub use cache::{CachedHooksProvider, SingleFlight};
pub use client::GithubHooksClient;
pub use config::GithubConfig;
