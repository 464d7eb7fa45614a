//! Authentication contracts and adapters

pub mod context;
pub mod driver;
pub mod guard;
pub mod signer;
pub mod token;

// Re-export main components
pub use context::RequestContext;
pub use driver::{
    AuthDriver, Credentials, LoginOptions, LoginResult, Principal, RefreshResult,
    SharedAuthDriver,
};
pub use guard::{CredentialGuard, MemoryGuard, SharedGuard};
pub use signer::{JwtSigner, SharedSigner, SignerConfig, TokenSigner};
pub use token::Claims;
