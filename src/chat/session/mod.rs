//! Session persistence.

pub mod token_store;

pub use token_store::{FileTokenStore, MemoryTokenStore, SESSION_TOKEN_KEY, TokenStore};
