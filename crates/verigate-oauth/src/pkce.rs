//! PKCE (RFC 7636): Proof Key for Code Exchange.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Code challenge transformation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    Plain,
    S256,
}

impl CodeChallengeMethod {
    /// Parse the wire value; anything but `plain` / `S256` is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plain" => Some(Self::Plain),
            "S256" => Some(Self::S256),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

/// Compute the challenge a verifier transforms to under the given method.
///
/// `S256` is `base64url-nopad(SHA-256(verifier))`; `plain` is the
/// verifier itself.
pub fn compute_challenge(verifier: &str, method: CodeChallengeMethod) -> String {
    match method {
        CodeChallengeMethod::Plain => verifier.to_string(),
        CodeChallengeMethod::S256 => {
            let digest = Sha256::digest(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(digest)
        }
    }
}

/// Verify a code verifier against the stored challenge.
///
/// Unknown methods fail. Comparison is constant-time.
pub fn verify(verifier: &str, challenge: &str, method: &str) -> bool {
    let Some(method) = CodeChallengeMethod::parse(method) else {
        return false;
    };
    let computed = compute_challenge(verifier, method);
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}
