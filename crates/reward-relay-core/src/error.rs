//! Error types for reward-relay core operations.
//!
//! One taxonomy crosses the core boundary: authorization, validation,
//! not-found and conflict conditions are surfaced to callers (the management
//! API maps them to response codes), while connectivity and classification
//! failures are absorbed and logged inside the pipeline.

use thiserror::Error;

use crate::model::WebhookRegistration;

/// Errors produced by the webhook pipeline and the hook management service.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Caller is not allowed to perform the operation, or the supplied
    /// provider credential is unusable (non-retryable).
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The requested entity does not exist. Distinct from connection
    /// failures: the remote answered, it just had nothing for us.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// A registration already exists for the organization. Carries the
    /// existing record so callers can short-circuit duplicate-creation flows.
    #[error("webhook already exists for organization {}", existing.organization_id)]
    Conflict { existing: Box<WebhookRegistration> },

    /// Caller supplied an argument that fails validation (non-retryable).
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The remote provider could not be reached or answered with an
    /// unexpected status (retryable on the next reconciliation cycle).
    #[error("provider connection error: {message}")]
    Connection { message: String },

    /// The dispatch queue is at capacity; the delivery was rejected rather
    /// than accepted and silently dropped.
    #[error("dispatch queue full")]
    QueueFull,

    /// The webhook store failed at the persistence layer.
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RelayError {
    /// Check if this error represents a transient condition that may succeed
    /// if retried later.
    ///
    /// Connection failures and queue overflow clear up on their own; the
    /// remaining variants need caller action before a retry can help.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => false,
            Self::NotFound { .. } => false,
            Self::Conflict { .. } => false,
            Self::InvalidArgument { .. } => false,
            Self::Connection { .. } => true,
            Self::QueueFull => true,
            Self::Storage { .. } => false,
        }
    }

    /// Convenience constructor for unauthorized conditions.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Convenience constructor for not-found conditions.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Convenience constructor for validation failures.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Convenience constructor for provider connectivity failures.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Convenience constructor for storage failures.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
