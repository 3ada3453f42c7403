// Password-grade hashing with scrypt (N=16384, r=16, p=1, dkLen=64) and a
// random 16-byte salt. Output format: "hex(salt):hex(key)".
//
// Used for user passwords and client secrets: values that are verified,
// never looked up. Token lookup hashes live in `token_hash`.

use rand::rngs::OsRng;
use rand::RngCore;
use scrypt::{scrypt, Params};
use subtle::ConstantTimeEq;
use verigate_core::AppError;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);

    let key = derive_key(password, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Verify a password against a hash produced by `hash_password`.
///
/// Comparison of the derived key is constant-time. A malformed stored
/// hash is an internal error, not a failed verification.
pub fn verify_password(hash: &str, password: &str) -> Result<bool, AppError> {
    let (salt, key_hex) = hash
        .split_once(':')
        .ok_or_else(|| AppError::internal("malformed password hash"))?;

    let expected = hex::decode(key_hex)
        .map_err(|_| AppError::internal("malformed password hash"))?;
    let derived = derive_key(password, salt)?;

    Ok(derived.ct_eq(&expected).into())
}

fn derive_key(password: &str, salt: &str) -> Result<Vec<u8>, AppError> {
    // N=16384 (log2 = 14), r=16, p=1, dkLen=64
    let params = Params::new(14, 16, 1, 64)
        .map_err(|e| AppError::internal(format!("invalid scrypt params: {e}")))?;

    let mut output = vec![0u8; 64];
    scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut output)
        .map_err(|e| AppError::internal(format!("scrypt failed: {e}")))?;
    Ok(output)
}
