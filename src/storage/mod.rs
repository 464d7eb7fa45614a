//! Storage for issued tokens and signed-token revocations

pub mod token_revocation;
pub mod token_store;

// Re-export the stores
pub use token_revocation::{
    create_memory_revocation_store, MemoryTokenRevocationStore, SharedTokenRevocationStore,
    TokenRevocationStore,
};
pub use token_store::{
    store_key, MemoryTokenStore, SharedTokenStore, TokenMeta, TokenRecord, TokenStore,
};
