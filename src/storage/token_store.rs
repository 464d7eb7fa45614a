//! Token store adapter
//!
//! Persists issued tokens keyed by their hash (session tokens) or id (OAuth
//! tokens). The store owns consistency; drivers treat it as the source of
//! truth for whether a token is live.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::constants::WILDCARD_ABILITY;
use crate::error::Result;

/// Metadata recorded with an issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMeta {
    /// Driver that issued the token; bulk operations are scoped to it
    pub driver: String,
    /// Device name or client label
    pub name: String,
    pub abilities: Vec<String>,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenMeta {
    pub fn new(driver: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            name: name.into(),
            abilities: vec![WILDCARD_ABILITY.to_string()],
            scopes: Vec::new(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| at <= Utc::now())
    }

    /// Whether the token grants `ability`
    pub fn can(&self, ability: &str) -> bool {
        self.abilities
            .iter()
            .any(|a| a == WILDCARD_ABILITY || a == ability)
    }
}

/// A stored token row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub principal_id: String,
    pub revoked: bool,
    pub meta: TokenMeta,
}

impl TokenRecord {
    /// Not revoked and not past its expiry
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.meta.is_expired()
    }
}

/// Key a driver stores `token_key` under, so rows of different drivers never collide
pub fn store_key(driver: &str, token_key: &str) -> String {
    format!("{}:{}", driver, token_key)
}

/// Token storage trait
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a token row under `token_hash`
    async fn put(&self, token_hash: &str, principal_id: &str, meta: TokenMeta) -> Result<()>;

    /// Look a token row up
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<TokenRecord>>;

    /// Flag an active row as revoked, keeping it; false if absent, revoked or expired
    async fn revoke(&self, token_hash: &str) -> Result<bool>;

    /// Flag every active row `driver` issued to a principal; returns rows newly revoked
    async fn revoke_all_for_principal(&self, principal_id: &str, driver: &str) -> Result<usize>;

    /// Physically remove a row; false if absent
    async fn delete(&self, token_hash: &str) -> Result<bool>;

    /// Physically remove every row `driver` issued to a principal
    async fn delete_all_for_principal(&self, principal_id: &str, driver: &str) -> Result<usize>;

    /// Drop rows past their expiry
    async fn prune_expired(&self) -> Result<usize>;
}

/// Shared reference to a token store
pub type SharedTokenStore = Arc<dyn TokenStore>;

/// In-memory implementation of the token store
pub struct MemoryTokenStore {
    /// Map of token hash -> record
    tokens: Arc<RwLock<HashMap<String, TokenRecord>>>,
    /// Index by principal for bulk operations
    principal_tokens: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            principal_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored rows, revoked ones included
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    /// Start background prune task
    pub fn start_cleanup_task(self: Arc<Self>, every: std::time::Duration) {
        let store = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = store.prune_expired().await {
                    log::error!("Failed to prune expired tokens: {}", e);
                }
            }
        });
    }

    async fn principal_hashes(&self, principal_id: &str) -> Vec<String> {
        let index = self.principal_tokens.read().await;
        index
            .get(principal_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn unindex(&self, principal_id: &str, token_hash: &str) {
        let mut index = self.principal_tokens.write().await;
        if let Some(set) = index.get_mut(principal_id) {
            set.remove(token_hash);
            if set.is_empty() {
                index.remove(principal_id);
            }
        }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, token_hash: &str, principal_id: &str, meta: TokenMeta) -> Result<()> {
        let record = TokenRecord {
            principal_id: principal_id.to_string(),
            revoked: false,
            meta,
        };

        let previous = self
            .tokens
            .write()
            .await
            .insert(token_hash.to_string(), record);

        if let Some(previous) = previous {
            if previous.principal_id != principal_id {
                self.unindex(&previous.principal_id, token_hash).await;
            }
        }

        self.principal_tokens
            .write()
            .await
            .entry(principal_id.to_string())
            .or_default()
            .insert(token_hash.to_string());

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.read().await.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> Result<bool> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(record) if record.is_active() => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_principal(&self, principal_id: &str, driver: &str) -> Result<usize> {
        let hashes = self.principal_hashes(principal_id).await;
        let mut count = 0;

        {
            let mut tokens = self.tokens.write().await;
            for hash in hashes {
                if let Some(record) = tokens.get_mut(&hash) {
                    if record.meta.driver == driver && record.is_active() {
                        record.revoked = true;
                        count += 1;
                    }
                }
            }
        }

        log::info!(
            "Revoked {} {} tokens for principal {}",
            count,
            driver,
            principal_id
        );
        Ok(count)
    }

    async fn delete(&self, token_hash: &str) -> Result<bool> {
        let removed = self.tokens.write().await.remove(token_hash);
        match removed {
            Some(record) => {
                self.unindex(&record.principal_id, token_hash).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all_for_principal(&self, principal_id: &str, driver: &str) -> Result<usize> {
        let hashes = self.principal_hashes(principal_id).await;

        let removed: Vec<String> = {
            let mut tokens = self.tokens.write().await;
            hashes
                .into_iter()
                .filter(|hash| {
                    let owned = tokens
                        .get(hash)
                        .map_or(false, |record| record.meta.driver == driver);
                    owned && tokens.remove(hash).is_some()
                })
                .collect()
        };

        for hash in &removed {
            self.unindex(principal_id, hash).await;
        }

        log::info!(
            "Deleted {} {} tokens for principal {}",
            removed.len(),
            driver,
            principal_id
        );
        Ok(removed.len())
    }

    async fn prune_expired(&self) -> Result<usize> {
        let expired: Vec<(String, String)> = {
            let tokens = self.tokens.read().await;
            tokens
                .iter()
                .filter(|(_, record)| record.meta.is_expired())
                .map(|(hash, record)| (hash.clone(), record.principal_id.clone()))
                .collect()
        };

        if expired.is_empty() {
            return Ok(0);
        }

        {
            let mut tokens = self.tokens.write().await;
            for (hash, _) in &expired {
                tokens.remove(hash);
            }
        }
        for (hash, principal_id) in &expired {
            self.unindex(principal_id, hash).await;
        }

        log::info!("Pruned {} expired tokens", expired.len());
        Ok(expired.len())
    }
}
