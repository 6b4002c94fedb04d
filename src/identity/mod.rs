//! Identity resolution for the acting user.
//!
//! The auth collaborator is reached through [`IdentityProvider`]; the
//! [`IdentityResolver`] caches the resolved id for the lifetime of a session
//! and can be invalidated to force a re-fetch.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::AppError;

/// What the auth collaborator knows about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
}

impl UserInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` means no session exists, which is recoverable.
    async fn current_user_info(&self) -> Result<Option<UserInfo>, AppError>;
}

/// Provider with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<UserInfo>,
}

impl StaticIdentity {
    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            user: Some(UserInfo::new(id)),
        }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user_info(&self) -> Result<Option<UserInfo>, AppError> {
        Ok(self.user.clone())
    }
}

/// Cached view of the current user's id.
pub struct IdentityResolver {
    provider: Arc<dyn IdentityProvider>,
    cached: RwLock<Option<String>>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            cached: RwLock::new(None),
        }
    }

    /// Resolve the acting user's id, hitting the provider only on a cold cache.
    pub async fn current_user_id(&self) -> Result<String, AppError> {
        if let Some(id) = self.cached.read().await.as_ref() {
            return Ok(id.clone());
        }

        let user = self
            .provider
            .current_user_info()
            .await?
            .filter(|user| !user.id.trim().is_empty())
            .ok_or_else(|| AppError::Unauthenticated("no signed-in user".to_string()))?;

        tracing::debug!(user_id = %user.id, "resolved current user");
        *self.cached.write().await = Some(user.id.clone());
        Ok(user.id)
    }

    /// Drop the cached id; the next call asks the provider again.
    pub async fn invalidate(&self) {
        self.cached.write().await.take();
    }
}
