//! Provider-login to platform-user resolution.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RelayError;

/// Maps provider logins to platform usernames.
///
/// Resolution decides whether an event can be attributed at all: a login
/// nobody has linked resolves to `None` and the dispatch pipeline drops the
/// event rather than scoring a stranger.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, remote_login: &str) -> Result<Option<String>, RelayError>;
}

/// In-memory resolver backed by an explicit link table, for testing and
/// development.
#[derive(Default)]
pub struct StaticIdentityResolver {
    links: RwLock<HashMap<String, String>>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn link(&self, remote_login: impl Into<String>, username: impl Into<String>) {
        self.links
            .write()
            .await
            .insert(remote_login.into(), username.into());
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, remote_login: &str) -> Result<Option<String>, RelayError> {
        Ok(self.links.read().await.get(remote_login).cloned())
    }
}
