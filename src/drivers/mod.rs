//! Built-in authentication drivers

pub mod oauth;
pub mod session;
pub mod signed;

pub use oauth::{OAuthClient, OAuthTokenDriver};
pub use session::SessionTokenDriver;
pub use signed::SignedTokenDriver;
