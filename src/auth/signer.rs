//! Signer adapter for self-contained tokens
//!
//! Signed tokens carry the principal id in their claims, so validation is a
//! signature and expiry check plus a blacklist lookup; no token store round
//! trip is involved.

use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::auth::token::{token_fingerprint, Claims};
use crate::error::{AuthFusionError, Result};
use crate::storage::token_revocation::{
    RevocationReason, RevokedToken, SharedTokenRevocationStore,
};

/// Trait for token signers
#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// Sign a new token for `principal_id` carrying `claims`
    async fn issue(&self, principal_id: &str, claims: &Map<String, Value>) -> Result<String>;

    /// Check signature, expiry and blacklist; returns the principal id
    async fn verify(&self, token: &str) -> Result<String>;

    /// Blacklist a token until it would have expired
    async fn invalidate(&self, token: &str) -> Result<()>;

    /// Blacklist `token` and sign a replacement for the same principal
    async fn refresh(&self, token: &str) -> Result<String>;
}

/// Shared reference to a signer
pub type SharedSigner = Arc<dyn TokenSigner>;

/// Signing parameters
#[derive(Clone)]
pub struct SignerConfig {
    pub secret: String,
    pub ttl: Duration,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// HS256 JWT signer with a jti blacklist
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: SignerConfig,
    revocations: SharedTokenRevocationStore,
}

impl JwtSigner {
    /// Creates a new signer with a secret
    pub fn new(config: SignerConfig, revocations: SharedTokenRevocationStore) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Blacklist entries live until `exp`, so expiry must be exact
        validation.leeway = 0;
        if let Some(ref iss) = config.issuer {
            validation.set_issuer(&[iss]);
        }
        match config.audience {
            Some(ref aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
            revocations,
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthFusionError::SignerError(format!("Failed to sign token: {}", e)))
    }

    fn new_claims(&self, principal_id: &str, custom: &Map<String, Value>) -> Claims {
        let mut claims = Claims::new(principal_id.to_string(), self.config.ttl).with_custom(custom);
        claims.iss = self.config.issuer.clone();
        claims.aud = self.config.audience.clone();
        claims
    }

    /// Validates signature and registered claims, ignoring the blacklist
    fn decode_claims(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthFusionError::InvalidToken("token expired".into()),
                ErrorKind::InvalidSignature => AuthFusionError::InvalidToken("bad signature".into()),
                _ => AuthFusionError::InvalidToken(e.to_string()),
            })
    }

    /// Decodes and rejects blacklisted tokens
    async fn live_claims(&self, token: &str) -> Result<Claims> {
        let claims = self.decode_claims(token)?;
        if self.revocations.is_token_revoked(&claims.jti).await? {
            return Err(AuthFusionError::InvalidToken("token revoked".into()));
        }
        Ok(claims)
    }

    async fn blacklist(&self, claims: &Claims, reason: RevocationReason) -> Result<()> {
        self.revocations
            .revoke_token(RevokedToken {
                token_id: claims.jti.clone(),
                principal_id: claims.sub.clone(),
                revoked_at: chrono::Utc::now(),
                expires_at: claims.expires_at(),
                reason,
            })
            .await
    }
}

#[async_trait]
impl TokenSigner for JwtSigner {
    async fn issue(&self, principal_id: &str, claims: &Map<String, Value>) -> Result<String> {
        let claims = self.new_claims(principal_id, claims);
        self.sign(&claims)
    }

    async fn verify(&self, token: &str) -> Result<String> {
        Ok(self.live_claims(token).await?.sub)
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        let claims = self.live_claims(token).await?;
        self.blacklist(&claims, RevocationReason::UserLogout).await
    }

    async fn refresh(&self, token: &str) -> Result<String> {
        let old = self.live_claims(token).await?;
        let fresh = self.new_claims(&old.sub, &old.custom);
        let new_token = self.sign(&fresh)?;

        self.blacklist(&old, RevocationReason::Refreshed).await?;
        log::debug!(
            "Rotated signed token {} for principal {}",
            token_fingerprint(token),
            old.sub
        );

        Ok(new_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::token_revocation::{create_memory_revocation_store, TokenRevocationStore};
    use serde_json::json;

    fn config() -> SignerConfig {
        SignerConfig {
            secret: "unit-signing-key-with-32-chars-min-0042".to_string(),
            ttl: Duration::minutes(30),
            issuer: Some("auth-fusion".to_string()),
            audience: None,
        }
    }

    fn signer() -> JwtSigner {
        JwtSigner::new(config(), create_memory_revocation_store())
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let signer = signer();
        let token = signer.issue("u1", &Map::new()).await.unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(signer.verify(&token).await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn test_foreign_and_garbage_tokens_rejected() {
        let signer = signer();
        let mut other = config();
        other.secret = "another-signing-key-with-32-chars-9911".to_string();
        let foreign = JwtSigner::new(other, create_memory_revocation_store())
            .issue("u1", &Map::new())
            .await
            .unwrap();

        assert!(matches!(
            signer.verify(&foreign).await,
            Err(AuthFusionError::InvalidToken(_))
        ));
        assert!(signer.verify("invalid.token.here").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let signer = signer();
        let mut claims = signer.new_claims("u1", &Map::new());
        claims.exp = claims.iat - 3600;
        let token = signer.sign(&claims).unwrap();

        let err = signer.verify(&token).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid token: token expired");
    }

    #[tokio::test]
    async fn test_token_just_past_expiry_rejected() {
        let signer = signer();
        let mut claims = signer.new_claims("u1", &Map::new());
        claims.exp = claims.iat - 30;
        let token = signer.sign(&claims).unwrap();

        assert!(matches!(
            signer.verify(&token).await,
            Err(AuthFusionError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_cleared_blacklist_does_not_revive_token() {
        let revocations = create_memory_revocation_store();
        let signer = JwtSigner::new(config(), revocations.clone());

        let mut claims = signer.new_claims("u1", &Map::new());
        claims.exp = claims.iat - 30;
        let token = signer.sign(&claims).unwrap();

        // Entry for the same jti whose expiry has passed
        signer
            .blacklist(&claims, RevocationReason::UserLogout)
            .await
            .unwrap();
        assert_eq!(revocations.cleanup_expired_revocations().await.unwrap(), 1);

        assert!(signer.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_blacklists_token() {
        let signer = signer();
        let token = signer.issue("u1", &Map::new()).await.unwrap();

        signer.invalidate(&token).await.unwrap();
        assert!(signer.verify(&token).await.is_err());
        assert!(signer.invalidate(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_keeps_custom_claims() {
        let signer = signer();
        let mut custom = Map::new();
        custom.insert("tenant".to_string(), json!("acme"));

        let old = signer.issue("u1", &custom).await.unwrap();
        let new = signer.refresh(&old).await.unwrap();

        assert_ne!(old, new);
        assert!(signer.verify(&old).await.is_err());
        assert_eq!(signer.verify(&new).await.unwrap(), "u1");

        let claims = signer.decode_claims(&new).unwrap();
        assert_eq!(claims.custom.get("tenant"), Some(&json!("acme")));
        assert_eq!(claims.iss.as_deref(), Some("auth-fusion"));
    }
}
