//! Configuration module
//! Reads the default driver name and per-driver settings from the environment

use crate::auth::signer::SignerConfig;
use crate::constants::{
    DEFAULT_DRIVER, DEFAULT_HOST, DEFAULT_OAUTH_GUARD, DEFAULT_OAUTH_TTL_DAYS, DEFAULT_PORT,
    DEFAULT_SESSION_GUARD, DEFAULT_SIGNED_GUARD, DEFAULT_SIGNED_TTL_MINUTES,
};
use crate::drivers::OAuthClient;
use crate::error::{AuthFusionError, Result};
use crate::manager::DriverSettings;
use chrono::Duration;
use std::env;

/// Authentication configuration parameters
#[derive(Clone)]
pub struct AuthConfig {
    pub default_driver: String,
    pub session_guard: String,
    pub signed_guard: String,
    pub oauth_guard: String,
    /// Session tokens never expire when unset
    pub session_ttl_minutes: Option<i64>,
    /// Signed tokens are unavailable when unset
    pub jwt_secret: Option<String>,
    pub jwt_ttl_minutes: i64,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    /// OAuth tokens are unavailable when unset
    pub oauth_client_id: Option<String>,
    pub oauth_ttl_days: i64,
    /// Demo server bind address
    pub host: String,
    pub port: u16,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("default_driver", &self.default_driver)
            .field("session_guard", &self.session_guard)
            .field("signed_guard", &self.signed_guard)
            .field("oauth_guard", &self.oauth_guard)
            .field("session_ttl_minutes", &self.session_ttl_minutes)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_ttl_minutes", &self.jwt_ttl_minutes)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("oauth_client_id", &self.oauth_client_id)
            .field("oauth_ttl_days", &self.oauth_ttl_days)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_driver: DEFAULT_DRIVER.to_string(),
            session_guard: DEFAULT_SESSION_GUARD.to_string(),
            signed_guard: DEFAULT_SIGNED_GUARD.to_string(),
            oauth_guard: DEFAULT_OAUTH_GUARD.to_string(),
            session_ttl_minutes: None,
            jwt_secret: None,
            jwt_ttl_minutes: DEFAULT_SIGNED_TTL_MINUTES,
            jwt_issuer: None,
            jwt_audience: None,
            oauth_client_id: None,
            oauth_ttl_days: DEFAULT_OAUTH_TTL_DAYS,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AuthConfig {
    /// Validate that a signing secret meets security requirements
    fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(AuthFusionError::ConfigError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "change-this",
            "changeme",
            "secret",
            "password",
            "12345",
        ];

        for pattern in &insecure_patterns {
            if secret.to_lowercase().contains(pattern) {
                return Err(AuthFusionError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Please use a secure random secret generated with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        // Ensure some complexity
        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AuthFusionError::ConfigError(
                "JWT secret should contain mixed characters (letters, numbers, symbols) for security"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let default_driver = non_empty_var("AUTH_FUSION_DRIVER").unwrap_or(defaults.default_driver);
        let session_guard =
            non_empty_var("AUTH_FUSION_SESSION_GUARD").unwrap_or(defaults.session_guard);
        let signed_guard = non_empty_var("AUTH_FUSION_SIGNED_GUARD").unwrap_or(defaults.signed_guard);
        let oauth_guard = non_empty_var("AUTH_FUSION_OAUTH_GUARD").unwrap_or(defaults.oauth_guard);

        let session_ttl_minutes = env::var("AUTH_FUSION_SESSION_TTL_MINUTES")
            .ok()
            .and_then(|t| t.parse().ok())
            .filter(|t: &i64| *t > 0);

        let jwt_secret = non_empty_var("AUTH_FUSION_JWT_SECRET");
        if let Some(ref secret) = jwt_secret {
            Self::validate_secret(secret)?;
        }

        let jwt_ttl_minutes = env::var("AUTH_FUSION_JWT_TTL_MINUTES")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.jwt_ttl_minutes);
        if jwt_ttl_minutes <= 0 {
            return Err(AuthFusionError::ConfigError(
                "AUTH_FUSION_JWT_TTL_MINUTES must be positive".to_string(),
            ));
        }

        let oauth_ttl_days = env::var("AUTH_FUSION_OAUTH_TTL_DAYS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(defaults.oauth_ttl_days);

        let host = non_empty_var("AUTH_FUSION_HOST").unwrap_or(defaults.host);
        let port = env::var("AUTH_FUSION_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        Ok(Self {
            default_driver,
            session_guard,
            signed_guard,
            oauth_guard,
            session_ttl_minutes,
            jwt_secret,
            jwt_ttl_minutes,
            jwt_issuer: non_empty_var("AUTH_FUSION_JWT_ISSUER"),
            jwt_audience: non_empty_var("AUTH_FUSION_JWT_AUDIENCE"),
            oauth_client_id: non_empty_var("AUTH_FUSION_OAUTH_CLIENT_ID"),
            oauth_ttl_days,
            host,
            port,
        })
    }

    /// Guard bindings and session lifetime for the manager
    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            session_guard: self.session_guard.clone(),
            signed_guard: self.signed_guard.clone(),
            oauth_guard: self.oauth_guard.clone(),
            session_ttl: self.session_ttl_minutes.map(Duration::minutes),
        }
    }

    /// Signer parameters, if a secret is configured
    pub fn signer_config(&self) -> Option<SignerConfig> {
        self.jwt_secret.as_ref().map(|secret| SignerConfig {
            secret: secret.clone(),
            ttl: Duration::minutes(self.jwt_ttl_minutes),
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
        })
    }

    /// OAuth client, if a client id is configured
    pub fn oauth_client(&self) -> Option<OAuthClient> {
        self.oauth_client_id.as_ref().map(|id| {
            OAuthClient::new(id.clone()).with_token_ttl(Duration::days(self.oauth_ttl_days))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_optional_capabilities() {
        let config = AuthConfig::default();
        assert_eq!(config.default_driver, "session");
        assert!(config.signer_config().is_none());
        assert!(config.oauth_client().is_none());
        assert_eq!(config.driver_settings().signed_guard, "api");
    }

    #[test]
    fn test_secret_validation() {
        assert!(AuthConfig::validate_secret("short").is_err());
        assert!(AuthConfig::validate_secret("this-has-the-word-secret-in-it-000000").is_err());
        assert!(AuthConfig::validate_secret("onlylettersonlylettersonlyletters").is_err());
        assert!(AuthConfig::validate_secret("k9$Qw2!vLz7#Rt4@Xp1&Mn8*Hb3^Gf6%Ad").is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = AuthConfig::default();
        config.jwt_secret = Some("k9$Qw2!vLz7#Rt4@Xp1&Mn8*Hb3^Gf6%Ad".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("k9$Qw2"));
        assert!(rendered.contains("<redacted>"));
    }
}
