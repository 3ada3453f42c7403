//! Wire DTOs for the OAuth endpoints.

use serde::{Deserialize, Serialize};

use crate::error::OAuthError;

/// Authorization request query parameters (RFC 6749 §4.1.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// Token request form body (RFC 6749 §4.1.3 / §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub code_verifier: Option<String>,
}

/// Revocation request form body (RFC 7009 §2.1). Client credentials may
/// arrive in the form instead of the Authorization header.
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Protocol error body (RFC 6749 §5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl From<&OAuthError> for ErrorResponse {
    fn from(err: &OAuthError) -> Self {
        Self {
            error: err.code().to_string(),
            error_description: Some(err.description().to_string()),
            error_uri: None,
        }
    }
}

/// OIDC UserInfo response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
}

/// Data backing the consent UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentPageData {
    pub client_name: String,
    pub client_id: String,
    pub requested_scope: String,
    pub scope_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// The user's consent decision.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsentDecision {
    pub client_id: String,
    pub scope: String,
    pub consent: bool,
}

/// Where a redirect-flow error should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub redirect_uri: String,
    pub state: Option<String>,
}

/// Result of driving an authorization attempt through the engine.
///
/// The handler dispatches exhaustively: issue the code redirect, bounce
/// to the consent UI, or render the error (via redirect once the
/// redirect_uri has been validated, as JSON before that).
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// Code persisted; send the user agent back to the client.
    CodeIssued {
        target: RedirectTarget,
        code: String,
    },
    /// Consent is missing or insufficient; bounce to the consent UI with
    /// every original parameter preserved.
    ConsentRequired { request: AuthorizeRequest },
}

/// An authorize-flow error plus where to surface it.
#[derive(Debug, Clone)]
pub struct AuthorizeError {
    pub error: OAuthError,
    /// Present once the redirect_uri was validated against the client.
    pub target: Option<RedirectTarget>,
}

impl AuthorizeError {
    /// Error raised before the redirect_uri was validated: JSON body.
    pub fn direct(error: OAuthError) -> Self {
        Self {
            error,
            target: None,
        }
    }

    /// Error raised after validation: carried on the redirect.
    pub fn redirect(error: OAuthError, redirect_uri: impl Into<String>, state: Option<String>) -> Self {
        Self {
            error,
            target: Some(RedirectTarget {
                redirect_uri: redirect_uri.into(),
                state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_omits_empty_fields() {
        let resp = TokenResponse {
            access_token: "jwt".into(),
            token_type: "Bearer".into(),
            expires_in: 900,
            refresh_token: None,
            scope: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("scope").is_none());
    }

    #[test]
    fn test_error_response_from_oauth_error() {
        let body = ErrorResponse::from(&OAuthError::invalid_grant());
        assert_eq!(body.error, "invalid_grant");
        assert!(body.error_description.is_some());
    }

    #[test]
    fn test_authorize_request_defaults() {
        let req: AuthorizeRequest =
            serde_json::from_str(r#"{"response_type":"code","client_id":"abc"}"#).unwrap();
        assert_eq!(req.response_type, "code");
        assert_eq!(req.redirect_uri, "");
        assert!(req.scope.is_none());
    }
}
