//! Convenience surface over a shared manager
//!
//! `AuthFusion` is the handle an application keeps for its lifetime;
//! `RequestAuth` binds it to one request so handlers can ask "who is this?"
//! without threading tokens around.

use std::sync::Arc;

use crate::auth::context::RequestContext;
use crate::auth::driver::{Principal, SharedAuthDriver};
use crate::error::Result;
use crate::manager::{AuthDriverManager, SharedAuthManager};

#[derive(Clone)]
pub struct AuthFusion {
    manager: SharedAuthManager,
}

impl AuthFusion {
    pub fn new(manager: AuthDriverManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn from_shared(manager: SharedAuthManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &AuthDriverManager {
        &self.manager
    }

    pub fn driver(&self, name: Option<&str>) -> Result<SharedAuthDriver> {
        self.manager.driver(name)
    }

    pub fn for_request<'a>(&'a self, context: &'a RequestContext) -> RequestAuth<'a> {
        RequestAuth {
            manager: &self.manager,
            context,
        }
    }

    pub fn available_drivers(&self) -> Result<Vec<String>> {
        self.manager.available_drivers()
    }
}

/// Request-bound helper; every call goes through the default driver
pub struct RequestAuth<'a> {
    manager: &'a AuthDriverManager,
    context: &'a RequestContext,
}

impl<'a> RequestAuth<'a> {
    /// Bearer token presented with the request
    pub fn token(&self) -> Option<String> {
        self.context.bearer_token()
    }

    /// Principal behind the request's bearer token
    pub async fn user(&self) -> Option<Principal> {
        let token = self.token()?;
        match self.manager.driver(None) {
            Ok(driver) => driver.get_user(&token).await,
            Err(e) => {
                log::error!("Cannot resolve request principal: {}", e);
                None
            }
        }
    }

    pub async fn check(&self) -> bool {
        self.user().await.is_some()
    }

    /// Validate `token`, or the request's own token when `None`
    pub async fn validate(&self, token: Option<&str>) -> bool {
        let token = match token.map(str::to_string).or_else(|| self.token()) {
            Some(token) => token,
            None => return false,
        };

        match self.manager.driver(None) {
            Ok(driver) => driver.validate(&token).await,
            Err(e) => {
                log::error!("Cannot validate token: {}", e);
                false
            }
        }
    }

    /// Log out the request's own token
    pub async fn logout(&self) -> bool {
        let token = match self.token() {
            Some(token) => token,
            None => return false,
        };

        match self.manager.driver(None) {
            Ok(driver) => driver.logout(Some(&token), self.context).await,
            Err(e) => {
                log::error!("Cannot log out: {}", e);
                false
            }
        }
    }

    pub fn available_drivers(&self) -> Result<Vec<String>> {
        self.manager.available_drivers()
    }
}
