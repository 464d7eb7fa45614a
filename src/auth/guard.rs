//! Credential guard adapter
//!
//! The guard is the host's credential-verification subsystem. Drivers only
//! need two things from it: check a credential set, and look a principal up
//! by the id stored alongside a token.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::auth::driver::{Credentials, Principal};
use crate::constants::{IDENTIFIER_FIELD, SECRET_FIELD};
use crate::error::{AuthFusionError, Result};

/// Trait for credential guards
#[async_trait]
pub trait CredentialGuard: Send + Sync {
    /// Resolve the principal for `credentials`, or fail with `InvalidCredentials`
    async fn attempt(&self, credentials: &Credentials) -> Result<Principal>;

    /// Look up a principal by id
    async fn retrieve_by_id(&self, principal_id: &str) -> Result<Option<Principal>>;
}

/// Shared reference to a guard
pub type SharedGuard = Arc<dyn CredentialGuard>;

struct StoredAccount {
    principal: Principal,
    password_hash: String,
}

/// In-memory guard backed by Argon2id password hashes
pub struct MemoryGuard {
    accounts: RwLock<HashMap<String, StoredAccount>>,
    /// Verified against when the id is unknown so both failure paths do the same work
    dummy_hash: String,
}

impl MemoryGuard {
    pub fn new() -> Result<Self> {
        Ok(Self {
            accounts: RwLock::new(HashMap::new()),
            dummy_hash: hash_secret("auth-fusion-dummy-secret")?,
        })
    }

    /// Registers (or replaces) an account
    pub fn add_account(&self, principal: Principal, secret: &str) -> Result<()> {
        let password_hash = hash_secret(secret)?;
        let id = principal.id.clone();

        self.accounts.write()?.insert(
            id.clone(),
            StoredAccount {
                principal,
                password_hash,
            },
        );

        log::debug!("Registered account {}", id);
        Ok(())
    }

    /// Builder-style variant of [`MemoryGuard::add_account`]
    pub fn with_account(self, principal: Principal, secret: &str) -> Result<Self> {
        self.add_account(principal, secret)?;
        Ok(self)
    }

    pub fn remove_account(&self, principal_id: &str) -> Result<bool> {
        Ok(self.accounts.write()?.remove(principal_id).is_some())
    }
}

fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthFusionError::StorageError(format!("Failed to hash secret: {}", e)))
}

fn verify_secret(secret: &str, encoded_hash: &str) -> bool {
    match PasswordHash::new(encoded_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

#[async_trait]
impl CredentialGuard for MemoryGuard {
    async fn attempt(&self, credentials: &Credentials) -> Result<Principal> {
        let (id, secret) = match (
            credentials.get(IDENTIFIER_FIELD),
            credentials.get(SECRET_FIELD),
        ) {
            (Some(id), Some(secret)) => (id, secret),
            _ => return Err(AuthFusionError::InvalidCredentials),
        };

        let account = {
            let accounts = self.accounts.read()?;
            accounts
                .get(id)
                .map(|a| (a.principal.clone(), a.password_hash.clone()))
        };

        match account {
            Some((principal, hash)) if verify_secret(secret, &hash) => Ok(principal),
            Some(_) => {
                log::debug!("Secret mismatch for {}", id);
                Err(AuthFusionError::InvalidCredentials)
            }
            None => {
                let _ = verify_secret(secret, &self.dummy_hash);
                log::debug!("Unknown identifier {}", id);
                Err(AuthFusionError::InvalidCredentials)
            }
        }
    }

    async fn retrieve_by_id(&self, principal_id: &str) -> Result<Option<Principal>> {
        Ok(self
            .accounts
            .read()?
            .get(principal_id)
            .map(|a| a.principal.clone()))
    }
}
