//! # Reward-Relay Core
//!
//! Core business logic for the reward-relay webhook ingestion and
//! reconciliation service.
//!
//! This crate contains the domain logic for receiving GitHub webhooks,
//! verifying signatures, classifying deliveries into domain events, and
//! submitting the qualifying ones to the reward engine. It also owns webhook
//! lifecycle management: watching and unwatching organizations, repository
//! and event gating, and periodic reconciliation of local registrations
//! against remote hook state.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - All external dependencies are abstracted behind traits
//!
//! The seams are [`provider::HooksProvider`] (remote REST API),
//! [`store::WebhookStore`] (registration persistence),
//! [`engine::RewardEngine`] (rule catalog and point submission),
//! [`identity::IdentityResolver`] and [`authz::ManagerDirectory`] (the
//! surrounding platform's users).
//!
//! ## Usage
//!
//! ```rust
//! use reward_relay_core::{OrganizationId, Trigger};
//!
//! // Core types are available for use across the system
//! let organization = OrganizationId::new(4242);
//! assert_eq!(organization.value(), 4242);
//! assert_eq!(Trigger::PullRequest.as_str(), "pull_request");
//! ```

/// Standard result type for reward-relay operations
pub type RelayResult<T> = Result<T, error::RelayError>;

// ============================================================================
// Module declarations
// ============================================================================

/// Manager directory seam for management authorization
pub mod authz;

/// Delivery intake: verification, classification, and the worker pool
pub mod dispatch;

/// Reward engine seam: catalog queries and event submission
pub mod engine;

/// Error taxonomy crossing the core boundary
pub mod error;

/// Repository gating and the watch-scope switch
pub mod gate;

/// Operator-facing webhook lifecycle management
pub mod hooks;

/// Identity resolver seam mapping remote logins to platform users
pub mod identity;

/// Shared domain types: identifiers, vocabularies, registrations
pub mod model;

/// Loosely-typed webhook payload access
pub mod payload;

/// Trigger plugins turning payloads into domain events
pub mod plugin;

/// Remote hooks provider seam
pub mod provider;

/// Remote-state reconciliation and its scheduler
pub mod reconcile;

/// HMAC signature verification of raw delivery bodies
pub mod signature;

/// Registration persistence and credential encoding
pub mod store;

// Re-export key types for convenience
pub use authz::{ManagerDirectory, StaticManagerDirectory};
pub use dispatch::{DispatchOutcome, DispatchPool, EventDispatcher, WebhookDelivery};
pub use engine::{CatalogEntry, MemoryRewardEngine, RewardEngine};
pub use error::RelayError;
pub use gate::{MemorySettingsStore, RepositoryGate, SettingsStore};
pub use hooks::{HookService, HookSummary};
pub use identity::{IdentityResolver, StaticIdentityResolver};
pub use model::{
    DomainEvent, EventName, HookId, ObjectType, OrganizationId, RemoteHook, RemoteHookId,
    RemoteOrganization, RemoteRepository, RepositoryId, ScoredEvent, TokenStatus, Trigger,
    WebhookRegistration,
};
pub use payload::WebhookPayload;
pub use plugin::TriggerRegistry;
pub use provider::{CreatedHook, HooksProvider};
pub use reconcile::{spawn_reconciliation, ReconcileSummary, Reconciler};
pub use signature::{SignatureScheme, SignatureVerifier};
pub use store::{Base64Codec, CredentialCodec, MemoryWebhookStore, WebhookStore};
