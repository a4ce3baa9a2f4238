//! Parsed webhook payload access.
//!
//! Plugins never deserialize provider payloads into typed structs; the
//! provider's shapes are wide and version-drifting, and a classification only
//! reads a handful of fields. `WebhookPayload` wraps the parsed JSON document
//! and offers path lookups that answer `None` for anything absent, so a
//! malformed payload degrades into "no events" instead of an error.

use serde_json::Value;

use crate::model::{OrganizationId, RepositoryId};

/// One parsed inbound payload.
#[derive(Debug, Clone)]
pub struct WebhookPayload {
    value: Value,
}

impl WebhookPayload {
    /// Parse raw payload bytes. `None` when the body is not a JSON document.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        serde_json::from_slice(raw).ok().map(|value| Self { value })
    }

    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    /// Identifier of the organization the delivery belongs to, when present.
    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.i64_at(&["organization", "id"]).map(OrganizationId::new)
    }

    /// Identifier of the repository the delivery belongs to, when present.
    /// Organization-level events (membership changes, some pushes) omit it.
    pub fn repository_id(&self) -> Option<RepositoryId> {
        self.i64_at(&["repository", "id"]).map(RepositoryId::new)
    }

    /// The delivery's `action` field, carried by most event types.
    pub fn action(&self) -> Option<&str> {
        self.str_at(&["action"])
    }

    /// String value at a nested path.
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.at(path)?.as_str()
    }

    /// Integer value at a nested path; tolerates string-encoded numbers the
    /// way older provider payloads sometimes carry them.
    pub fn i64_at(&self, path: &[&str]) -> Option<i64> {
        let value = self.at(path)?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }

    /// Boolean value at a nested path.
    pub fn bool_at(&self, path: &[&str]) -> Option<bool> {
        self.at(path)?.as_bool()
    }

    /// Whether a non-null value exists at a nested path.
    pub fn has(&self, path: &[&str]) -> bool {
        matches!(self.at(path), Some(v) if !v.is_null())
    }

    fn at(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.value;
        for key in path {
            current = current.get(key)?;
        }
        Some(current)
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
