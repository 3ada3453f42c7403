// Secure random wire identifiers.
//
// Identifiers are URL-safe base64 (padded) of OS-sourced random bytes:
// 16 bytes for client ids, 32 for client secrets, authorization codes,
// and refresh tokens. Decoding accepts both padded and unpadded forms.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Encode `n` random bytes as URL-safe base64 with padding.
pub fn random_token(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// New public client identifier (16 random bytes).
pub fn client_id() -> String {
    random_token(16)
}

/// New client secret (32 random bytes).
pub fn client_secret() -> String {
    random_token(32)
}

/// New authorization code (32 random bytes).
pub fn authorization_code() -> String {
    random_token(32)
}

/// New opaque refresh token (32 random bytes).
pub fn refresh_token() -> String {
    random_token(32)
}

/// Decode URL-safe base64, accepting padded and unpadded input.
pub fn decode_token(s: &str) -> Option<Vec<u8>> {
    URL_SAFE
        .decode(s)
        .or_else(|_| URL_SAFE_NO_PAD.decode(s))
        .ok()
}
