//! Management authorization.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RelayError;

/// Answers whether a platform user may administer webhook registrations.
/// Every management operation checks this before touching state.
#[async_trait]
pub trait ManagerDirectory: Send + Sync {
    async fn is_manager(&self, username: &str) -> Result<bool, RelayError>;
}

/// In-memory directory with an explicit member list, for testing and
/// development.
#[derive(Default)]
pub struct StaticManagerDirectory {
    members: RwLock<HashSet<String>>,
}

impl StaticManagerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, username: impl Into<String>) {
        self.members.write().await.insert(username.into());
    }
}

#[async_trait]
impl ManagerDirectory for StaticManagerDirectory {
    async fn is_manager(&self, username: &str) -> Result<bool, RelayError> {
        Ok(self.members.read().await.contains(username))
    }
}
