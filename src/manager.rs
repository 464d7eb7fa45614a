//! Driver manager: lazy construction, caching and runtime extension of drivers
//!
//! Factories are construction recipes keyed by name; the cache holds at most
//! one live instance per name. Swapping a factory does not touch an instance
//! already cached under that name until it is disconnected.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::auth::driver::SharedAuthDriver;
use crate::auth::guard::SharedGuard;
use crate::auth::signer::SharedSigner;
use crate::config::AuthConfig;
use crate::constants::{
    BUILTIN_DRIVERS, DEFAULT_DRIVER, DEFAULT_OAUTH_GUARD, DEFAULT_SESSION_GUARD,
    DEFAULT_SIGNED_GUARD, OAUTH_DRIVER, SESSION_DRIVER, SIGNED_DRIVER,
};
use crate::drivers::{OAuthClient, OAuthTokenDriver, SessionTokenDriver, SignedTokenDriver};
use crate::error::{AuthFusionError, Result};
use crate::storage::token_store::SharedTokenStore;

/// Builds a driver from the host's adapters
pub type DriverFactory = Arc<dyn Fn(&DriverServices) -> Result<SharedAuthDriver> + Send + Sync>;

/// Which guard each built-in driver binds to, plus session token lifetime
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub session_guard: String,
    pub signed_guard: String,
    pub oauth_guard: String,
    pub session_ttl: Option<chrono::Duration>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            session_guard: DEFAULT_SESSION_GUARD.to_string(),
            signed_guard: DEFAULT_SIGNED_GUARD.to_string(),
            oauth_guard: DEFAULT_OAUTH_GUARD.to_string(),
            session_ttl: None,
        }
    }
}

/// External adapters available to driver construction
#[derive(Clone, Default)]
pub struct DriverServices {
    guards: HashMap<String, SharedGuard>,
    pub token_store: Option<SharedTokenStore>,
    pub signer: Option<SharedSigner>,
    pub oauth_client: Option<OAuthClient>,
    pub settings: DriverSettings,
}

impl DriverServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guard(mut self, name: impl Into<String>, guard: SharedGuard) -> Self {
        self.guards.insert(name.into(), guard);
        self
    }

    pub fn with_token_store(mut self, store: SharedTokenStore) -> Self {
        self.token_store = Some(store);
        self
    }

    pub fn with_signer(mut self, signer: SharedSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_oauth_client(mut self, client: OAuthClient) -> Self {
        self.oauth_client = Some(client);
        self
    }

    pub fn with_settings(mut self, settings: DriverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Guard registered under `name`
    pub fn guard(&self, name: &str) -> Result<SharedGuard> {
        self.guards.get(name).cloned().ok_or_else(|| {
            AuthFusionError::DriverUnavailable(format!("no guard registered as [{}]", name))
        })
    }
}

pub struct AuthDriverManager {
    services: DriverServices,
    drivers: RwLock<HashMap<String, SharedAuthDriver>>,
    custom_creators: RwLock<HashMap<String, DriverFactory>>,
    default_driver: RwLock<String>,
}

impl AuthDriverManager {
    pub fn new(services: DriverServices, default_driver: impl Into<String>) -> Self {
        Self {
            services,
            drivers: RwLock::new(HashMap::new()),
            custom_creators: RwLock::new(HashMap::new()),
            default_driver: RwLock::new(default_driver.into()),
        }
    }

    /// Manager wired from configuration; config settings override the services'
    pub fn from_config(config: &AuthConfig, services: DriverServices) -> Self {
        let services = services.with_settings(config.driver_settings());
        Self::new(services, config.default_driver.clone())
    }

    pub fn services(&self) -> &DriverServices {
        &self.services
    }

    /// Get a driver instance, the default one when `name` is `None`
    pub fn driver(&self, name: Option<&str>) -> Result<SharedAuthDriver> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.get_default_driver()?,
        };

        if let Some(driver) = self.drivers.read()?.get(&name) {
            return Ok(Arc::clone(driver));
        }

        let mut drivers = self.drivers.write()?;
        // Another caller may have built it while we waited for the write lock
        if let Some(driver) = drivers.get(&name) {
            return Ok(Arc::clone(driver));
        }

        let driver = self.create_driver(&name)?;
        drivers.insert(name.clone(), Arc::clone(&driver));
        log::debug!("Created auth driver [{}]", name);

        Ok(driver)
    }

    fn create_driver(&self, name: &str) -> Result<SharedAuthDriver> {
        // Custom creators take precedence over built-ins
        let creator = self.custom_creators.read()?.get(name).cloned();
        if let Some(creator) = creator {
            return creator(&self.services);
        }

        let services = &self.services;
        let settings = &services.settings;
        let driver: SharedAuthDriver = match name {
            SESSION_DRIVER => Arc::new(
                SessionTokenDriver::new(
                    services.guard(&settings.session_guard)?,
                    services.token_store.clone(),
                )
                .with_default_ttl(settings.session_ttl),
            ),
            SIGNED_DRIVER => Arc::new(SignedTokenDriver::new(
                services.guard(&settings.signed_guard)?,
                services.signer.clone(),
            )),
            OAUTH_DRIVER => Arc::new(OAuthTokenDriver::new(
                services.guard(&settings.oauth_guard)?,
                services.token_store.clone(),
                services.oauth_client.clone(),
            )),
            _ => {
                log::warn!("Requested unsupported auth driver [{}]", name);
                return Err(AuthFusionError::UnsupportedDriver(name.to_string()));
            }
        };

        Ok(driver)
    }

    /// Register a custom driver creator
    pub fn extend<F>(&self, name: impl Into<String>, factory: F) -> Result<&Self>
    where
        F: Fn(&DriverServices) -> Result<SharedAuthDriver> + Send + Sync + 'static,
    {
        let name = name.into();
        log::info!("Registered custom auth driver [{}]", name);
        self.custom_creators
            .write()?
            .insert(name, Arc::new(factory));
        Ok(self)
    }

    pub fn get_default_driver(&self) -> Result<String> {
        Ok(self.default_driver.read()?.clone())
    }

    pub fn set_default_driver(&self, name: impl Into<String>) -> Result<&Self> {
        *self.default_driver.write()? = name.into();
        Ok(self)
    }

    /// Snapshot of the cached instances
    pub fn get_drivers(&self) -> Result<HashMap<String, SharedAuthDriver>> {
        Ok(self.drivers.read()?.clone())
    }

    /// Disconnect the given driver (default when `None`) and drop it from the cache
    pub fn disconnect_driver(&self, name: Option<&str>) -> Result<&Self> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.get_default_driver()?,
        };

        if self.drivers.write()?.remove(&name).is_some() {
            log::debug!("Disconnected auth driver [{}]", name);
        }
        Ok(self)
    }

    pub fn disconnect_all_drivers(&self) -> Result<&Self> {
        self.drivers.write()?.clear();
        Ok(self)
    }

    /// Built-in names plus registered custom names, sorted
    pub fn available_drivers(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = BUILTIN_DRIVERS.iter().map(|n| n.to_string()).collect();
        for name in self.custom_creators.read()?.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl Default for AuthDriverManager {
    fn default() -> Self {
        Self::new(DriverServices::default(), DEFAULT_DRIVER)
    }
}

/// Shared reference to a manager
pub type SharedAuthManager = Arc<AuthDriverManager>;
