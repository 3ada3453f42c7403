//! # verigate-memory
//!
//! In-memory implementations of the VeriGate store and cache contracts.
//! All state lives in `Arc<RwLock<…>>` maps, so cloned handles share
//! data. Suitable for tests and development; nothing survives the
//! process.

pub mod cache;
pub mod store;

pub use cache::InMemoryCache;
pub use store::{
    InMemoryAuthCodeStore, InMemoryClientStore, InMemoryConsentStore, InMemoryOAuthTokenStore,
    InMemoryScopeStore, InMemoryUserStore, InMemoryWebSessionStore,
};
