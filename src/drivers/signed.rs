//! Signed-token driver
//!
//! Delegates issuance, verification, refresh and invalidation to a
//! [`TokenSigner`](crate::auth::signer::TokenSigner).

use async_trait::async_trait;

use crate::auth::context::RequestContext;
use crate::auth::driver::{
    AuthDriver, Credentials, LoginOptions, LoginResult, Principal, RefreshResult,
};
use crate::auth::guard::SharedGuard;
use crate::auth::signer::SharedSigner;
use crate::auth::token::token_fingerprint;
use crate::constants::SIGNED_DRIVER;
use crate::error::{AuthFusionError, Result};

pub struct SignedTokenDriver {
    guard: SharedGuard,
    signer: Option<SharedSigner>,
}

impl SignedTokenDriver {
    pub fn new(guard: SharedGuard, signer: Option<SharedSigner>) -> Self {
        Self { guard, signer }
    }

    fn signer(&self) -> Result<&SharedSigner> {
        self.signer.as_ref().ok_or_else(|| {
            AuthFusionError::DriverUnavailable("signed driver has no signer configured".to_string())
        })
    }

    async fn resolve(&self, token: &str) -> Result<Option<Principal>> {
        let principal_id = self.signer()?.verify(token).await?;
        self.guard.retrieve_by_id(&principal_id).await
    }
}

#[async_trait]
impl AuthDriver for SignedTokenDriver {
    async fn login(&self, credentials: &Credentials, options: &LoginOptions) -> Result<LoginResult> {
        let signer = self.signer()?;
        let principal = self.guard.attempt(credentials).await?;
        let token = signer.issue(&principal.id, &options.claims).await?;

        log::debug!(
            "Issued signed token {} for principal {}",
            token_fingerprint(&token),
            principal.id
        );
        Ok(LoginResult { token, principal })
    }

    async fn logout(&self, token: Option<&str>, context: &RequestContext) -> bool {
        let signer = match self.signer() {
            Ok(signer) => signer,
            Err(_) => return false,
        };

        let token = match token.map(str::to_string).or_else(|| context.bearer_token()) {
            Some(token) => token,
            None => return false,
        };

        match signer.invalidate(&token).await {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Signed logout of {} failed: {}", token_fingerprint(&token), e);
                false
            }
        }
    }

    async fn refresh(&self, token: &str) -> Result<RefreshResult> {
        let signer = self.signer()?;
        if self.resolve(token).await?.is_none() {
            return Err(AuthFusionError::InvalidToken(
                "token principal no longer exists".to_string(),
            ));
        }

        let token = signer.refresh(token).await?;
        Ok(RefreshResult { token })
    }

    async fn get_user(&self, token: &str) -> Option<Principal> {
        match self.resolve(token).await {
            Ok(principal) => principal,
            Err(e) => {
                log::debug!("Signed token resolution failed: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        SIGNED_DRIVER
    }
}
