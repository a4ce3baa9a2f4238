//! Webhook registration storage.
//!
//! The store keeps one registration per organization and is the only place
//! credentials live at rest. Secrets and tokens are run through a
//! [`CredentialCodec`] on the way in and out, so a dump of the backing store
//! never contains plaintext credentials. Registrations returned by the store
//! always carry decoded credentials.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::RelayError;
use crate::model::{HookId, OrganizationId, WebhookRegistration};

/// Reversible encoding applied to credentials at rest.
pub trait CredentialCodec: Send + Sync {
    fn encode(&self, plaintext: &str) -> String;

    fn decode(&self, encoded: &str) -> Result<String, RelayError>;
}

/// Base64 credential codec. Not encryption; it keeps credentials out of
/// casual reads of the backing store while staying dependency-free to decode
/// for operators with store access.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Codec;

impl CredentialCodec for Base64Codec {
    fn encode(&self, plaintext: &str) -> String {
        BASE64.encode(plaintext.as_bytes())
    }

    fn decode(&self, encoded: &str) -> Result<String, RelayError> {
        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| RelayError::storage(format!("stored credential is not valid base64: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| RelayError::storage(format!("stored credential is not valid utf-8: {e}")))
    }
}

/// Persistence seam for webhook registrations.
///
/// `save` enforces the one-hook-per-organization invariant: saving a second
/// registration for the same organization fails with
/// [`RelayError::Conflict`] carrying the existing registration.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Persist a new registration. The store assigns the id and stamps the
    /// watched, updated, and refresh dates.
    async fn save(&self, registration: WebhookRegistration)
        -> Result<WebhookRegistration, RelayError>;

    async fn find_by_id(&self, id: HookId) -> Result<Option<WebhookRegistration>, RelayError>;

    async fn find_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<WebhookRegistration>, RelayError>;

    /// Page through registrations in id order. A `limit` of zero means no
    /// limit.
    async fn list(&self, offset: usize, limit: usize)
        -> Result<Vec<WebhookRegistration>, RelayError>;

    /// Ids of every registration, in id order. The reconciliation walk uses
    /// this instead of [`WebhookStore::list`] so each registration is
    /// re-read fresh as the walk reaches it.
    async fn list_ids(&self) -> Result<Vec<HookId>, RelayError>;

    async fn count(&self) -> Result<usize, RelayError>;

    /// Replace the stored access token and stamp the updated date.
    async fn update_token(&self, id: HookId, token: &str)
        -> Result<WebhookRegistration, RelayError>;

    /// Replace the stored trigger list and stamp the refresh date.
    async fn update_triggers(
        &self,
        id: HookId,
        triggers: &[String],
    ) -> Result<WebhookRegistration, RelayError>;

    /// Remove a registration, returning it. Fails with
    /// [`RelayError::NotFound`] when the id is unknown.
    async fn delete(&self, id: HookId) -> Result<WebhookRegistration, RelayError>;
}

// ============================================================================
// In-memory store
// ============================================================================

struct StoreInner {
    next_id: i64,
    // Keyed by hook id; values hold encoded credentials.
    hooks: BTreeMap<i64, WebhookRegistration>,
}

/// In-memory webhook store for testing and development.
pub struct MemoryWebhookStore {
    codec: Arc<dyn CredentialCodec>,
    inner: RwLock<StoreInner>,
}

impl MemoryWebhookStore {
    pub fn new(codec: Arc<dyn CredentialCodec>) -> Self {
        Self {
            codec,
            inner: RwLock::new(StoreInner {
                next_id: 1,
                hooks: BTreeMap::new(),
            }),
        }
    }

    fn decoded(&self, stored: &WebhookRegistration) -> Result<WebhookRegistration, RelayError> {
        let mut registration = stored.clone();
        registration.secret = self.codec.decode(&stored.secret)?;
        registration.token = self.codec.decode(&stored.token)?;
        Ok(registration)
    }
}

impl Default for MemoryWebhookStore {
    fn default() -> Self {
        Self::new(Arc::new(Base64Codec))
    }
}

#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn save(
        &self,
        registration: WebhookRegistration,
    ) -> Result<WebhookRegistration, RelayError> {
        let mut inner = self.inner.write().await;

        let organization_id = registration.organization_id;
        if let Some(existing) = inner
            .hooks
            .values()
            .find(|hook| hook.organization_id == organization_id)
        {
            let existing = self.decoded(existing)?;
            return Err(RelayError::Conflict {
                existing: Box::new(existing),
            });
        }

        let now = Utc::now();
        let mut stored = registration;
        stored.id = HookId::new(inner.next_id);
        stored.watched_date = now;
        stored.updated_date = now;
        stored.refresh_date = now;
        stored.secret = self.codec.encode(&stored.secret);
        stored.token = self.codec.encode(&stored.token);

        inner.next_id += 1;
        inner.hooks.insert(stored.id.value(), stored.clone());
        self.decoded(&stored)
    }

    async fn find_by_id(&self, id: HookId) -> Result<Option<WebhookRegistration>, RelayError> {
        let inner = self.inner.read().await;
        inner
            .hooks
            .get(&id.value())
            .map(|stored| self.decoded(stored))
            .transpose()
    }

    async fn find_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<WebhookRegistration>, RelayError> {
        let inner = self.inner.read().await;
        inner
            .hooks
            .values()
            .find(|hook| hook.organization_id == organization_id)
            .map(|stored| self.decoded(stored))
            .transpose()
    }

    async fn list(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<WebhookRegistration>, RelayError> {
        let inner = self.inner.read().await;
        let limit = if limit == 0 { usize::MAX } else { limit };
        inner
            .hooks
            .values()
            .skip(offset)
            .take(limit)
            .map(|stored| self.decoded(stored))
            .collect()
    }

    async fn list_ids(&self) -> Result<Vec<HookId>, RelayError> {
        let inner = self.inner.read().await;
        Ok(inner.hooks.keys().copied().map(HookId::new).collect())
    }

    async fn count(&self) -> Result<usize, RelayError> {
        let inner = self.inner.read().await;
        Ok(inner.hooks.len())
    }

    async fn update_token(
        &self,
        id: HookId,
        token: &str,
    ) -> Result<WebhookRegistration, RelayError> {
        let encoded = self.codec.encode(token);
        let mut inner = self.inner.write().await;
        let stored = inner
            .hooks
            .get_mut(&id.value())
            .ok_or_else(|| RelayError::not_found(format!("webhook {id} not found")))?;
        stored.token = encoded;
        stored.updated_date = Utc::now();
        let stored = stored.clone();
        self.decoded(&stored)
    }

    async fn update_triggers(
        &self,
        id: HookId,
        triggers: &[String],
    ) -> Result<WebhookRegistration, RelayError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .hooks
            .get_mut(&id.value())
            .ok_or_else(|| RelayError::not_found(format!("webhook {id} not found")))?;
        stored.triggers = triggers.to_vec();
        stored.refresh_date = Utc::now();
        let stored = stored.clone();
        self.decoded(&stored)
    }

    async fn delete(&self, id: HookId) -> Result<WebhookRegistration, RelayError> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .hooks
            .remove(&id.value())
            .ok_or_else(|| RelayError::not_found(format!("webhook {id} not found")))?;
        self.decoded(&stored)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
