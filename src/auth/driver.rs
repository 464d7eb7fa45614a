//! The capability set every authentication strategy implements
//!
//! A driver turns credentials into a bearer token and resolves bearer tokens
//! back into principals. Tokens are only meaningful to the driver that issued
//! them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::context::RequestContext;
use crate::constants::WILDCARD_ABILITY;
use crate::error::Result;

/// Resolved identity of an authenticated entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Field name to value mapping handed to the guard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(HashMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Strategy specific knobs for token issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOptions {
    /// Abilities granted to an opaque token
    #[serde(default = "default_abilities")]
    pub abilities: Vec<String>,
    /// Hard expiry for the issued token
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Audit label stored with the token
    #[serde(default)]
    pub device_name: Option<String>,
    /// OAuth scopes; falls back to `abilities` when empty
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Extra claims embedded in signed tokens
    #[serde(default)]
    pub claims: Map<String, Value>,
}

fn default_abilities() -> Vec<String> {
    vec![WILDCARD_ABILITY.to_string()]
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            abilities: default_abilities(),
            expires_at: None,
            device_name: None,
            scopes: Vec::new(),
            claims: Map::new(),
        }
    }
}

impl LoginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abilities<I, S>(mut self, abilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abilities = abilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.claims.insert(key.into(), value);
        self
    }
}

/// Token issued by a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResult {
    pub token: String,
    pub principal: Principal,
}

/// Replacement token issued by a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub token: String,
}

/// Trait for authentication drivers
///
/// `login` and `refresh` report failures. `logout`, `validate` and
/// `get_user` are total: any internal failure is the negative answer.
#[async_trait]
pub trait AuthDriver: Send + Sync {
    /// Check credentials with the guard and issue a token for the principal
    async fn login(&self, credentials: &Credentials, options: &LoginOptions) -> Result<LoginResult>;

    /// Invalidate `token`, or every token of the context principal when absent
    async fn logout(&self, token: Option<&str>, context: &RequestContext) -> bool;

    /// Issue a token replacing `token`
    async fn refresh(&self, token: &str) -> Result<RefreshResult>;

    /// True iff `token` resolves to a principal
    async fn validate(&self, token: &str) -> bool {
        self.get_user(token).await.is_some()
    }

    /// Resolve `token` to its principal
    async fn get_user(&self, token: &str) -> Option<Principal>;

    /// Stable strategy identifier
    fn name(&self) -> &'static str;
}

/// Shared reference to a driver instance
pub type SharedAuthDriver = Arc<dyn AuthDriver>;
