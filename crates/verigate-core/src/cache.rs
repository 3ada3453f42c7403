// Cache contract.
//
// Keyed string values with TTL semantics. The cache is an optimization:
// callers treat every failure as a miss and fall through to the store,
// logging at warn.

use std::time::Duration;

use async_trait::async_trait;

/// Errors from cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache serialization error: {0}")]
    Serialization(String),
    #[error("cache error: {0}")]
    Other(String),
}

/// TTL key-value cache shared across all workers.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value. `None` if missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Set a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Cache key for an OAuth access token record, by `jti`.
pub fn oauth_access_key(token_id: &str) -> String {
    format!("oauth:access:{token_id}")
}
