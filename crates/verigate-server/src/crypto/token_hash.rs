// Deterministic token lookup hash.
//
// Stored `token_hash` columns must be exact-match queryable, so they use
// HMAC-SHA-256 under a server-held key rather than a salted password
// hash. The stored form stays non-invertible without the key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Keyed hasher shared by both token realms.
#[derive(Clone)]
pub struct TokenHasher {
    key: Vec<u8>,
}

impl std::fmt::Debug for TokenHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenHasher").finish_non_exhaustive()
    }
}

impl TokenHasher {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
        }
    }

    /// Hex-encoded HMAC-SHA-256 of the token string.
    pub fn hash(&self, token: &str) -> String {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac key");
        mac.update(token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let hasher = TokenHasher::new("server-key");
        assert_eq!(hasher.hash("token-a"), hasher.hash("token-a"));
        assert_ne!(hasher.hash("token-a"), hasher.hash("token-b"));
    }

    #[test]
    fn test_key_dependent() {
        let a = TokenHasher::new("key-one");
        let b = TokenHasher::new("key-two");
        assert_ne!(a.hash("token"), b.hash("token"));
    }

    #[test]
    fn test_hex_output() {
        let hasher = TokenHasher::new("k");
        let out = hasher.hash("t");
        assert_eq!(out.len(), 64);
        assert!(out.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
