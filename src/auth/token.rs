use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::SESSION_TOKEN_BYTES;

/// Registered claim names that custom claims may not override
const RESERVED_CLAIMS: [&str; 7] = ["sub", "exp", "iat", "nbf", "jti", "iss", "aud"];

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal ID)
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
    /// Not before (as UTC timestamp)
    pub nbf: usize,
    /// Unique token ID, used as the blacklist key
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Caller supplied claims carried through refreshes
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    /// Creates new claims for a principal, valid for `ttl` from now
    pub fn new(principal_id: String, ttl: Duration) -> Self {
        let now = Utc::now().timestamp().max(0) as usize;
        let ttl_secs = ttl.num_seconds().max(0) as usize;

        Self {
            sub: principal_id,
            exp: now + ttl_secs,
            iat: now,
            nbf: now,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            iss: None,
            aud: None,
            custom: Map::new(),
        }
    }

    /// Attaches custom claims, dropping any that collide with registered names
    pub fn with_custom(mut self, custom: &Map<String, Value>) -> Self {
        for (key, value) in custom {
            if RESERVED_CLAIMS.contains(&key.as_str()) {
                log::warn!("Ignoring custom claim '{}' that shadows a registered claim", key);
                continue;
            }
            self.custom.insert(key.clone(), value.clone());
        }
        self
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp().max(0) as usize;
        now > self.exp
    }

    /// Expiration as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp as i64, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Mints a fresh opaque token: random bytes, base64url without padding
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest under which opaque tokens are stored
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Short, non-reversible token label for log lines
pub fn token_fingerprint(token: &str) -> String {
    hash_token(token)[..8].to_string()
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    let (scheme, token) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
