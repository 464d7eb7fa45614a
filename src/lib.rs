//! Auth Fusion - pluggable authentication drivers behind one manager
//!
//! Opaque session tokens, signed tokens and OAuth personal access tokens
//! share a single driver contract. The manager builds drivers lazily,
//! caches them by name and lets hosts register their own.

pub mod auth;
pub mod config;
pub mod constants;
pub mod drivers;
pub mod error;
pub mod facade;
pub mod handlers;
pub mod manager;
pub mod security;
pub mod storage;

// Re-export main components
pub use auth::{AuthDriver, Credentials, LoginOptions, LoginResult, Principal, RefreshResult};
pub use config::AuthConfig;
pub use constants::*;
pub use error::{AuthFusionError, Result};
pub use facade::{AuthFusion, RequestAuth};
pub use manager::{AuthDriverManager, DriverServices, DriverSettings};
