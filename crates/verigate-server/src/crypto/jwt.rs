// RS256 JWT signing and verification.
//
// One RSA key pair, loaded from PEM at startup and shared by reference
// into both token realms. The verifier pins the algorithm to RS256 before
// any claim is inspected; `none`, symmetric algorithms, and mismatches
// are rejected by the library's validation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use verigate_core::AppError;

/// Issuer for tokens minted by the web-session realm.
pub const ISSUER_WEB: &str = "verigate-web";
/// Issuer for tokens minted by the OAuth realm.
pub const ISSUER_OAUTH: &str = "oauth-server";
/// `type` claim value for access tokens.
pub const TOKEN_TYPE_ACCESS: &str = "access";

/// Claims carried by every access JWT. The OAuth realm sets `aud` and
/// `scope`; the web realm leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub jti: String,
    pub sub: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// The loaded RSA key pair.
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys").finish_non_exhaustive()
    }
}

impl SigningKeys {
    /// Parse the PEM-encoded private and public keys.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, AppError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AppError::internal(format!("failed to parse private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| AppError::internal(format!("failed to parse public key: {e}")))?;
        Ok(Self { encoding, decoding })
    }

    /// Sign claims with RS256.
    pub fn sign(&self, claims: &AccessClaims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("failed to sign token: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// `aud` is checked by the caller against the bound client, so the
    /// library's audience validation is disabled here.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AppError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map_err(|_| AppError::unauthorized("invalid token"))?;
        Ok(data.claims)
    }

    /// Verify an access token for the given issuer: signature, expiry,
    /// `iss`, and `type` must all match.
    pub fn verify_access(&self, token: &str, expected_issuer: &str) -> Result<AccessClaims, AppError> {
        let claims = self.verify(token)?;
        if claims.token_type != TOKEN_TYPE_ACCESS {
            return Err(AppError::unauthorized("invalid token type"));
        }
        if claims.iss != expected_issuer {
            return Err(AppError::unauthorized("invalid token issuer"));
        }
        Ok(claims)
    }
}

/// Extract claims without verifying the signature.
///
/// Used only by revocation, which needs the `jti` of a token it is about
/// to mark revoked; the ownership check against the stored row follows.
pub fn decode_unverified(token: &str) -> Result<AccessClaims, AppError> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AppError::unauthorized("invalid token format"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AppError::unauthorized("invalid token format"))?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::unauthorized("invalid token claims"))
}
