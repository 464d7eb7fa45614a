//! Opaque session-token driver
//!
//! Tokens are random strings handed to the client once; the server only keeps
//! their SHA-256 digest. Logout physically deletes rows.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::auth::context::RequestContext;
use crate::auth::driver::{
    AuthDriver, Credentials, LoginOptions, LoginResult, Principal, RefreshResult,
};
use crate::auth::guard::SharedGuard;
use crate::auth::token::{generate_opaque_token, hash_token, token_fingerprint};
use crate::constants::{DEFAULT_DEVICE_NAME, REFRESHED_DEVICE_NAME, SESSION_DRIVER};
use crate::error::{AuthFusionError, Result};
use crate::storage::token_store::{store_key, SharedTokenStore, TokenMeta, TokenRecord};

pub struct SessionTokenDriver {
    guard: SharedGuard,
    store: Option<SharedTokenStore>,
    /// Applied when the caller passes no explicit expiry
    default_ttl: Option<Duration>,
}

impl SessionTokenDriver {
    pub fn new(guard: SharedGuard, store: Option<SharedTokenStore>) -> Self {
        Self {
            guard,
            store,
            default_ttl: None,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn store(&self) -> Result<&SharedTokenStore> {
        self.store.as_ref().ok_or_else(|| {
            AuthFusionError::DriverUnavailable(
                "session driver requires a token store to issue tokens".to_string(),
            )
        })
    }

    /// Store key for `token`: its digest, namespaced to this driver
    fn key(token: &str) -> String {
        store_key(SESSION_DRIVER, &hash_token(token))
    }

    /// Mint a token for `principal` and persist its hash
    async fn issue(&self, principal: &Principal, meta: TokenMeta) -> Result<String> {
        let store = self.store()?;
        let token = generate_opaque_token();
        store.put(&Self::key(&token), &principal.id, meta).await?;

        log::debug!(
            "Issued session token {} for principal {}",
            token_fingerprint(&token),
            principal.id
        );
        Ok(token)
    }

    /// Active record and resolved principal for `token`
    async fn resolve(&self, token: &str) -> Result<Option<(TokenRecord, Principal)>> {
        let store = self.store()?;
        let record = match store.find_by_hash(&Self::key(token)).await? {
            Some(record) if record.is_active() => record,
            _ => return Ok(None),
        };

        let principal = self.guard.retrieve_by_id(&record.principal_id).await?;
        Ok(principal.map(|principal| (record, principal)))
    }

    async fn context_principal(&self, context: &RequestContext) -> Option<Principal> {
        if let Some(principal) = context.principal() {
            return Some(principal.clone());
        }
        match context.bearer_token() {
            Some(token) => self.get_user(&token).await,
            None => None,
        }
    }

    async fn try_logout(&self, token: Option<&str>, context: &RequestContext) -> Result<bool> {
        let store = self.store()?;

        match token {
            Some(token) => {
                let deleted = store.delete(&Self::key(token)).await?;
                log::debug!(
                    "Session logout for token {}: deleted={}",
                    token_fingerprint(token),
                    deleted
                );
                Ok(deleted)
            }
            None => match self.context_principal(context).await {
                Some(principal) => {
                    let count = store
                        .delete_all_for_principal(&principal.id, SESSION_DRIVER)
                        .await?;
                    log::info!(
                        "Session logout deleted {} tokens for principal {}",
                        count,
                        principal.id
                    );
                    Ok(count > 0)
                }
                None => Ok(false),
            },
        }
    }
}

#[async_trait]
impl AuthDriver for SessionTokenDriver {
    async fn login(&self, credentials: &Credentials, options: &LoginOptions) -> Result<LoginResult> {
        // Fail on missing capability before touching the guard
        self.store()?;
        let principal = self.guard.attempt(credentials).await?;

        let mut meta = TokenMeta::new(
            SESSION_DRIVER,
            options
                .device_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
        );
        meta.abilities = options.abilities.clone();
        meta.expires_at = options
            .expires_at
            .or_else(|| self.default_ttl.map(|ttl| Utc::now() + ttl));

        let token = self.issue(&principal, meta).await?;
        Ok(LoginResult { token, principal })
    }

    async fn logout(&self, token: Option<&str>, context: &RequestContext) -> bool {
        match self.try_logout(token, context).await {
            Ok(done) => done,
            Err(e) => {
                log::warn!("Session logout failed: {}", e);
                false
            }
        }
    }

    async fn refresh(&self, token: &str) -> Result<RefreshResult> {
        let (record, principal) = self
            .resolve(token)
            .await?
            .ok_or_else(|| AuthFusionError::InvalidToken("token does not resolve".to_string()))?;

        // Not atomic: a failure after this point leaves the principal without a token
        self.store()?.delete(&Self::key(token)).await?;

        let mut meta = TokenMeta::new(SESSION_DRIVER, REFRESHED_DEVICE_NAME);
        meta.abilities = record.meta.abilities;
        // A capped session stays capped when no default lifetime applies
        meta.expires_at = self
            .default_ttl
            .map(|ttl| Utc::now() + ttl)
            .or(record.meta.expires_at);

        let token = self.issue(&principal, meta).await?;
        Ok(RefreshResult { token })
    }

    async fn get_user(&self, token: &str) -> Option<Principal> {
        match self.resolve(token).await {
            Ok(principal) => principal.map(|(_, principal)| principal),
            Err(e) => {
                log::debug!("Session token resolution failed: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        SESSION_DRIVER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::guard::MemoryGuard;
    use crate::storage::token_store::{MemoryTokenStore, TokenStore};
    use std::sync::Arc;

    fn guard() -> SharedGuard {
        Arc::new(
            MemoryGuard::new()
                .unwrap()
                .with_account(Principal::new("u1"), "pw")
                .unwrap(),
        )
    }

    fn creds() -> Credentials {
        Credentials::new().with("id", "u1").with("secret", "pw")
    }

    #[tokio::test]
    async fn test_login_stores_only_the_hash() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = SessionTokenDriver::new(guard(), Some(store.clone()));

        let result = driver.login(&creds(), &LoginOptions::default()).await.unwrap();

        assert!(store.find_by_hash(&result.token).await.unwrap().is_none());
        assert!(store.find_by_hash(&hash_token(&result.token)).await.unwrap().is_none());
        let record = store
            .find_by_hash(&SessionTokenDriver::key(&result.token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.principal_id, "u1");
        assert_eq!(record.meta.name, DEFAULT_DEVICE_NAME);
    }

    #[tokio::test]
    async fn test_login_without_store_is_unavailable() {
        let driver = SessionTokenDriver::new(guard(), None);

        let result = driver.login(&creds(), &LoginOptions::default()).await;
        assert!(matches!(result, Err(AuthFusionError::DriverUnavailable(_))));
        assert!(driver.get_user("anything").await.is_none());
        assert!(!driver.logout(Some("anything"), &RequestContext::new()).await);
    }

    #[tokio::test]
    async fn test_expired_token_does_not_resolve() {
        let store: SharedTokenStore = Arc::new(MemoryTokenStore::new());
        let driver = SessionTokenDriver::new(guard(), Some(store));

        let options = LoginOptions::new().with_expires_at(Utc::now() - Duration::seconds(1));
        let result = driver.login(&creds(), &options).await.unwrap();

        assert!(!driver.validate(&result.token).await);
        assert!(matches!(
            driver.refresh(&result.token).await,
            Err(AuthFusionError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_keeps_abilities() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = SessionTokenDriver::new(guard(), Some(store.clone()));

        let options = LoginOptions::new().with_abilities(["posts:read"]);
        let old = driver.login(&creds(), &options).await.unwrap().token;
        let new = driver.refresh(&old).await.unwrap().token;

        let record = store
            .find_by_hash(&SessionTokenDriver::key(&new))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.meta.name, REFRESHED_DEVICE_NAME);
        assert!(record.meta.can("posts:read"));
        assert!(!record.meta.can("posts:write"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_explicit_expiry_without_default_ttl() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = SessionTokenDriver::new(guard(), Some(store.clone()));

        let cap = Utc::now() + Duration::minutes(10);
        let old = driver
            .login(&creds(), &LoginOptions::new().with_expires_at(cap))
            .await
            .unwrap()
            .token;
        let new = driver.refresh(&old).await.unwrap().token;

        let record = store
            .find_by_hash(&SessionTokenDriver::key(&new))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.meta.expires_at, Some(cap));
    }

    #[tokio::test]
    async fn test_default_ttl_applies_on_refresh() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = SessionTokenDriver::new(guard(), Some(store.clone()))
            .with_default_ttl(Some(Duration::minutes(30)));

        let old = driver.login(&creds(), &LoginOptions::default()).await.unwrap().token;
        let new = driver.refresh(&old).await.unwrap().token;

        let record = store
            .find_by_hash(&SessionTokenDriver::key(&new))
            .await
            .unwrap()
            .unwrap();
        let expires_at = record.meta.expires_at.unwrap();
        assert!(expires_at > Utc::now() + Duration::minutes(29));
        assert!(expires_at <= Utc::now() + Duration::minutes(30));
    }
}
