//! HTTP integration for warp-based hosts

pub mod auth;

// Re-export the route builders
pub use auth::{auth_routes, handle_rejection, require_principal, with_request_context};
