//! # verigate-redis
//!
//! Redis-backed implementations: the TTL cache behind access-token
//! validation, and the web-session refresh token store (sessions live in
//! Redis and expire with their keys, so no sweeper is needed for them).

pub mod cache;
pub mod session;

pub use cache::RedisCache;
pub use session::RedisWebSessionStore;
