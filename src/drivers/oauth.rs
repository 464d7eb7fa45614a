//! OAuth personal-access-token driver
//!
//! Tokens are looked up by id and revoked by flag, never deleted, so the
//! store keeps an audit trail. Refresh is a separate grant flow and is not
//! offered here.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::auth::context::RequestContext;
use crate::auth::driver::{
    AuthDriver, Credentials, LoginOptions, LoginResult, Principal, RefreshResult,
};
use crate::auth::guard::SharedGuard;
use crate::auth::token::token_fingerprint;
use crate::constants::{DEFAULT_DEVICE_NAME, DEFAULT_OAUTH_TTL_DAYS, OAUTH_DRIVER};
use crate::error::{AuthFusionError, Result};
use crate::storage::token_store::{store_key, SharedTokenStore, TokenMeta};

/// Personal access client tokens are issued under
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub token_ttl: Duration,
}

impl OAuthClient {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token_ttl: Duration::days(DEFAULT_OAUTH_TTL_DAYS),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }
}

pub struct OAuthTokenDriver {
    guard: SharedGuard,
    store: Option<SharedTokenStore>,
    client: Option<OAuthClient>,
}

impl OAuthTokenDriver {
    pub fn new(
        guard: SharedGuard,
        store: Option<SharedTokenStore>,
        client: Option<OAuthClient>,
    ) -> Self {
        Self {
            guard,
            store,
            client,
        }
    }

    fn issuer(&self) -> Result<(&SharedTokenStore, &OAuthClient)> {
        match (&self.store, &self.client) {
            (Some(store), Some(client)) => Ok((store, client)),
            (None, _) => Err(AuthFusionError::DriverUnavailable(
                "oauth driver requires a token store".to_string(),
            )),
            (_, None) => Err(AuthFusionError::DriverUnavailable(
                "oauth driver has no client configured".to_string(),
            )),
        }
    }

    fn store(&self) -> Result<&SharedTokenStore> {
        self.store.as_ref().ok_or_else(|| {
            AuthFusionError::DriverUnavailable("oauth driver requires a token store".to_string())
        })
    }

    /// Store key for a token id, namespaced to this driver
    fn key(token_id: &str) -> String {
        store_key(OAUTH_DRIVER, token_id)
    }

    async fn resolve(&self, token_id: &str) -> Result<Option<Principal>> {
        match self.store()?.find_by_hash(&Self::key(token_id)).await? {
            Some(record) if record.is_active() => {
                self.guard.retrieve_by_id(&record.principal_id).await
            }
            _ => Ok(None),
        }
    }

    async fn try_logout(&self, token: Option<&str>, context: &RequestContext) -> Result<bool> {
        let store = self.store()?;

        match token {
            Some(token_id) => store.revoke(&Self::key(token_id)).await,
            None => {
                let principal = match context.principal() {
                    Some(principal) => Some(principal.clone()),
                    None => match context.bearer_token() {
                        Some(token_id) => self.resolve(&token_id).await?,
                        None => None,
                    },
                };

                match principal {
                    Some(principal) => Ok(store
                        .revoke_all_for_principal(&principal.id, OAUTH_DRIVER)
                        .await?
                        > 0),
                    None => Ok(false),
                }
            }
        }
    }
}

#[async_trait]
impl AuthDriver for OAuthTokenDriver {
    async fn login(&self, credentials: &Credentials, options: &LoginOptions) -> Result<LoginResult> {
        let (store, client) = self.issuer()?;
        let principal = self.guard.attempt(credentials).await?;

        let scopes = if options.scopes.is_empty() {
            options.abilities.clone()
        } else {
            options.scopes.clone()
        };

        let mut meta = TokenMeta::new(
            OAUTH_DRIVER,
            options
                .device_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
        );
        meta.abilities = scopes.clone();
        meta.scopes = scopes;
        meta.expires_at = Some(
            options
                .expires_at
                .unwrap_or_else(|| Utc::now() + client.token_ttl),
        );

        let token = uuid::Uuid::new_v4().simple().to_string();
        store.put(&Self::key(&token), &principal.id, meta).await?;

        log::debug!(
            "Issued oauth token {} via client {} for principal {}",
            token_fingerprint(&token),
            client.client_id,
            principal.id
        );
        Ok(LoginResult { token, principal })
    }

    async fn logout(&self, token: Option<&str>, context: &RequestContext) -> bool {
        match self.try_logout(token, context).await {
            Ok(done) => done,
            Err(e) => {
                log::warn!("OAuth logout failed: {}", e);
                false
            }
        }
    }

    async fn refresh(&self, _token: &str) -> Result<RefreshResult> {
        Err(AuthFusionError::UnsupportedOperation(
            "oauth tokens are refreshed through a refresh-token grant".to_string(),
        ))
    }

    async fn get_user(&self, token: &str) -> Option<Principal> {
        match self.resolve(token).await {
            Ok(principal) => principal,
            Err(e) => {
                log::debug!("OAuth token resolution failed: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        OAUTH_DRIVER
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
                .unwrap()
                .with_account(Principal::new("u2"), "pw2")
                .unwrap(),
        )
    }

    fn creds() -> Credentials {
        Credentials::new().with("id", "u1").with("secret", "pw")
    }

    #[tokio::test]
    async fn test_login_records_scopes_and_expiry() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = OAuthTokenDriver::new(guard(), Some(store.clone()), Some(OAuthClient::new("pac")));

        let options = LoginOptions::new().with_scopes(["orders:read"]);
        let token = driver.login(&creds(), &options).await.unwrap().token;

        let record = store
            .find_by_hash(&OAuthTokenDriver::key(&token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.meta.scopes, vec!["orders:read".to_string()]);
        assert!(record.meta.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_logout_revokes_without_deleting() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = OAuthTokenDriver::new(guard(), Some(store.clone()), Some(OAuthClient::new("pac")));
        let token = driver.login(&creds(), &LoginOptions::default()).await.unwrap().token;

        assert!(driver.logout(Some(&token), &RequestContext::new()).await);
        assert!(!driver.validate(&token).await);

        let record = store
            .find_by_hash(&OAuthTokenDriver::key(&token))
            .await
            .unwrap()
            .unwrap();
        assert!(record.revoked);

        // Nothing left to invalidate
        assert!(!driver.logout(Some(&token), &RequestContext::new()).await);
        assert!(!driver.logout(Some("unknown"), &RequestContext::new()).await);
    }

    #[tokio::test]
    async fn test_logout_of_expired_token_is_false() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = OAuthTokenDriver::new(guard(), Some(store), Some(OAuthClient::new("pac")));

        let options = LoginOptions::new().with_expires_at(Utc::now() - Duration::seconds(1));
        let token = driver.login(&creds(), &options).await.unwrap().token;

        assert!(!driver.logout(Some(&token), &RequestContext::new()).await);
    }

    #[tokio::test]
    async fn test_logout_all_for_context_principal() {
        let store = Arc::new(MemoryTokenStore::new());
        let driver = OAuthTokenDriver::new(guard(), Some(store.clone()), Some(OAuthClient::new("pac")));

        let first = driver.login(&creds(), &LoginOptions::default()).await.unwrap().token;
        let second = driver.login(&creds(), &LoginOptions::default()).await.unwrap().token;
        let other = driver
            .login(
                &Credentials::new().with("id", "u2").with("secret", "pw2"),
                &LoginOptions::default(),
            )
            .await
            .unwrap()
            .token;

        assert!(!driver.logout(None, &RequestContext::new()).await);
        assert!(driver.logout(None, &RequestContext::with_bearer(&first)).await);

        assert!(!driver.validate(&first).await);
        assert!(!driver.validate(&second).await);
        assert!(driver.validate(&other).await);
    }

    #[tokio::test]
    async fn test_missing_client_is_unavailable() {
        let driver = OAuthTokenDriver::new(guard(), Some(Arc::new(MemoryTokenStore::new())), None);

        assert!(matches!(
            driver.login(&creds(), &LoginOptions::default()).await,
            Err(AuthFusionError::DriverUnavailable(_))
        ));
    }
}
