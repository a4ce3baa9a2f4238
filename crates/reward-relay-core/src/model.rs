//! Core data model for the webhook pipeline.
//!
//! Identifiers are newtypes over the provider's numeric ids. The closed event
//! and trigger vocabularies live here so that plugins, the dispatch pipeline,
//! and the reward engine all agree on the same spelling.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Internal identifier of a stored webhook registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct HookId(i64);

impl HookId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the webhook on the provider side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RemoteHookId(i64);

impl RemoteHookId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RemoteHookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of the provider organization a registration is scoped to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct OrganizationId(i64);

impl OrganizationId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of a repository inside an organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RepositoryId(i64);

impl RepositoryId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Trigger and event vocabularies
// ============================================================================

/// Provider-side event-type names the remote webhook subscribes to.
///
/// These double as the lookup keys of the trigger-plugin registry; the value
/// of the provider's event-type header is matched against [`Trigger::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    PullRequest,
    Issues,
    IssueComment,
    PullRequestReview,
    PullRequestReviewComment,
    Push,
}

impl Trigger {
    /// Every trigger the connector watches, in registry order.
    pub const ALL: [Trigger; 6] = [
        Trigger::PullRequest,
        Trigger::Issues,
        Trigger::IssueComment,
        Trigger::PullRequestReview,
        Trigger::PullRequestReviewComment,
        Trigger::Push,
    ];

    /// The provider's wire name for this trigger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::PullRequest => "pull_request",
            Trigger::Issues => "issues",
            Trigger::IssueComment => "issue_comment",
            Trigger::PullRequestReview => "pull_request_review",
            Trigger::PullRequestReviewComment => "pull_request_review_comment",
            Trigger::Push => "push",
        }
    }

    /// Parse a provider event-type header value. Unknown names yield `None`;
    /// providers send event types an installation may not care about.
    pub fn from_header(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed vocabulary of domain event names.
///
/// The spelling matters: these are the rule-lookup keys handed to the reward
/// engine, so plugins and the engine catalog must agree on them exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    CreatePullRequest,
    ClosePullRequest,
    RequestReviewForPullRequest,
    ReviewRequestRemoved,
    CreateIssue,
    CloseIssue,
    AddIssueLabel,
    DeleteIssueLabel,
    CommentIssue,
    CommentPullRequest,
    DeleteIssueComment,
    DeletePullRequestComment,
    PullRequestReviewComment,
    ReviewPullRequest,
    PullRequestValidated,
    ValidatePullRequest,
    PushCode,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::CreatePullRequest => "createPullRequest",
            EventName::ClosePullRequest => "closePullRequest",
            EventName::RequestReviewForPullRequest => "requestReviewForPullRequest",
            EventName::ReviewRequestRemoved => "reviewRequestRemoved",
            EventName::CreateIssue => "createIssue",
            EventName::CloseIssue => "closeIssue",
            EventName::AddIssueLabel => "addIssueLabel",
            EventName::DeleteIssueLabel => "deleteIssueLabel",
            EventName::CommentIssue => "commentIssue",
            EventName::CommentPullRequest => "commentPullRequest",
            EventName::DeleteIssueComment => "deleteIssueComment",
            EventName::DeletePullRequestComment => "deletePullRequestComment",
            EventName::PullRequestReviewComment => "pullRequestReviewComment",
            EventName::ReviewPullRequest => "reviewPullRequest",
            EventName::PullRequestValidated => "pullRequestValidated",
            EventName::ValidatePullRequest => "validatePullRequest",
            EventName::PushCode => "pushCode",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object types attached to domain events for audit on the engine side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "githubIssue")]
    Issue,
    #[serde(rename = "githubPR")]
    PullRequest,
    #[serde(rename = "githubReviewComment")]
    ReviewComment,
    #[serde(rename = "githubCommentPR")]
    PullRequestComment,
    #[serde(rename = "githubCommentIssue")]
    IssueComment,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Issue => "githubIssue",
            ObjectType::PullRequest => "githubPR",
            ObjectType::ReviewComment => "githubReviewComment",
            ObjectType::PullRequestComment => "githubCommentPR",
            ObjectType::IssueComment => "githubCommentIssue",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Domain event
// ============================================================================

/// Normalized action record produced by a classification plugin from one
/// payload. Ephemeral: lives from classification to engine submission.
///
/// `sender` is only set when it may differ from `receiver`; an unset sender
/// shares the receiver's identity resolution in the dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    pub name: EventName,
    pub sender: Option<String>,
    pub receiver: String,
    pub object_id: String,
    pub object_type: Option<ObjectType>,
    pub organization_id: Option<OrganizationId>,
    pub repository_id: Option<RepositoryId>,
}

// ============================================================================
// Webhook registration
// ============================================================================

/// Durable record of the one webhook registered for an organization.
///
/// `secret` and `token` are opaque credentials: the store keeps them encoded,
/// and `Debug` redacts them so they cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// Internal store identifier.
    pub id: HookId,
    /// Identifier of the webhook on the provider side.
    pub webhook_id: RemoteHookId,
    /// Remote organization the registration is scoped to.
    pub organization_id: OrganizationId,
    /// Organization login name, kept for display and provider calls by name.
    pub organization_name: String,
    /// Provider event-type names the remote hook currently sends.
    pub triggers: Vec<String>,
    /// Soft enable flag for the whole registration.
    pub enabled: bool,
    /// When the organization was first watched.
    pub watched_date: DateTime<Utc>,
    /// User who created the registration.
    pub watched_by: String,
    /// Last local mutation (token rotation).
    pub updated_date: DateTime<Utc>,
    /// Last successful reconciliation refresh.
    pub refresh_date: DateTime<Utc>,
    /// Shared secret used to verify inbound payload signatures.
    pub secret: String,
    /// Provider access token used for outbound API calls.
    pub token: String,
}

impl fmt::Debug for WebhookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookRegistration")
            .field("id", &self.id)
            .field("webhook_id", &self.webhook_id)
            .field("organization_id", &self.organization_id)
            .field("organization_name", &self.organization_name)
            .field("triggers", &self.triggers)
            .field("enabled", &self.enabled)
            .field("watched_date", &self.watched_date)
            .field("watched_by", &self.watched_by)
            .field("updated_date", &self.updated_date)
            .field("refresh_date", &self.refresh_date)
            .field("secret", &"[REDACTED]")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Remote provider metadata
// ============================================================================

/// Result of a remote credential check. Never persisted; consumed immediately
/// to decide whether an outbound call may proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    /// Whether the provider accepted the credential at all.
    pub valid: bool,
    /// Remaining call budget in the current window, when reported.
    pub remaining: Option<u64>,
    /// Epoch second at which the budget resets, when reported.
    pub reset: Option<u64>,
}

impl TokenStatus {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            remaining: None,
            reset: None,
        }
    }

    /// A token is usable when it is valid and its budget is not exhausted.
    pub fn is_usable(&self) -> bool {
        self.valid && self.remaining != Some(0)
    }
}

/// Organization metadata fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrganization {
    pub id: OrganizationId,
    /// Login name (stable handle).
    pub name: String,
    /// Display title; falls back to the login when unset remotely.
    pub title: String,
    /// Description; empty when unset remotely.
    pub description: String,
    pub avatar_url: String,
}

/// Repository metadata fetched from the provider, enriched with the
/// repository-gate state when listed through the management service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: RepositoryId,
    pub name: String,
    pub description: Option<String>,
    /// Filled from the repository gate; not a provider field.
    #[serde(default)]
    pub enabled: bool,
}

/// Remote webhook state as reported by the provider: its id and the event
/// types it currently delivers. What reconciliation diffs against the local
/// trigger list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHook {
    pub id: RemoteHookId,
    pub events: Vec<String>,
}

// ============================================================================
// Engine submission
// ============================================================================

/// The unit handed to the reward engine: a rule title plus the participants
/// and object reference of one qualifying domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredEvent {
    pub rule_title: String,
    pub sender_id: String,
    /// May be absent when only the sender side resolved.
    pub receiver_id: Option<String>,
    pub object_id: String,
    pub object_type: Option<ObjectType>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
