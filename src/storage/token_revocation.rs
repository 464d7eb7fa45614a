//! Token revocation storage and management
//!
//! Signed tokens are self-contained, so invalidating one before it expires
//! means remembering its `jti` until the token would have expired anyway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::Result;

/// Information about a revoked token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    /// JWT ID (jti)
    pub token_id: String,
    /// Principal who owned the token
    pub principal_id: String,
    /// When the token was revoked
    pub revoked_at: DateTime<Utc>,
    /// When the original token expires (for cleanup)
    pub expires_at: DateTime<Utc>,
    pub reason: RevocationReason,
}

/// Reason for token revocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    /// User initiated logout
    UserLogout,
    /// Replaced by a refreshed token
    Refreshed,
}

/// Token revocation storage trait
#[async_trait]
pub trait TokenRevocationStore: Send + Sync {
    /// Add a token to the revocation list
    async fn revoke_token(&self, revoked_token: RevokedToken) -> Result<()>;

    /// Check if a token is revoked
    async fn is_token_revoked(&self, token_id: &str) -> Result<bool>;

    /// Clean up revocations whose token has expired anyway
    async fn cleanup_expired_revocations(&self) -> Result<usize>;
}

/// In-memory implementation of token revocation store
pub struct MemoryTokenRevocationStore {
    /// Map of token_id -> RevokedToken
    revoked_tokens: Arc<RwLock<HashMap<String, RevokedToken>>>,
}

impl MemoryTokenRevocationStore {
    /// Create a new memory-based token revocation store
    pub fn new() -> Self {
        Self {
            revoked_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self: Arc<Self>, every: std::time::Duration) {
        let store = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = store.cleanup_expired_revocations().await {
                    log::error!("Failed to cleanup expired token revocations: {}", e);
                }
            }
        });
    }
}

#[async_trait]
impl TokenRevocationStore for MemoryTokenRevocationStore {
    async fn revoke_token(&self, revoked_token: RevokedToken) -> Result<()> {
        let token_id = revoked_token.token_id.clone();
        let reason = revoked_token.reason;

        self.revoked_tokens
            .write()
            .await
            .insert(token_id.clone(), revoked_token);

        log::info!("Token revoked: {} ({:?})", token_id, reason);
        Ok(())
    }

    async fn is_token_revoked(&self, token_id: &str) -> Result<bool> {
        let revoked_tokens = self.revoked_tokens.read().await;
        Ok(revoked_tokens.contains_key(token_id))
    }

    async fn cleanup_expired_revocations(&self) -> Result<usize> {
        let now = Utc::now();
        let mut revoked_tokens = self.revoked_tokens.write().await;
        let before = revoked_tokens.len();

        revoked_tokens.retain(|_, revoked| revoked.expires_at >= now);

        let removed_count = before - revoked_tokens.len();
        if removed_count > 0 {
            log::info!("Cleaned up {} expired token revocations", removed_count);
        }

        Ok(removed_count)
    }
}

impl Default for MemoryTokenRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared reference to token revocation store
pub type SharedTokenRevocationStore = Arc<dyn TokenRevocationStore>;

/// Create a new memory-based token revocation store
pub fn create_memory_revocation_store() -> SharedTokenRevocationStore {
    Arc::new(MemoryTokenRevocationStore::new())
}
