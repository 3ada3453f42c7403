//! Redirect URL building for the authorize flow.
//!
//! Parameters are appended through `url::Url` so existing query strings
//! on registered redirect URIs survive and values are percent-encoded.

use url::Url;

use crate::error::OAuthError;
use crate::types::AuthorizeRequest;

/// Append `code` (and `state` when present) to the redirect URI.
pub fn code_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> Option<String> {
    let mut url = Url::parse(redirect_uri).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("code", code);
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Some(url.into())
}

/// Append `error`, `error_description`, and `state` per RFC 6749 §4.1.2.1.
pub fn error_redirect(redirect_uri: &str, error: &OAuthError, state: Option<&str>) -> Option<String> {
    let mut url = Url::parse(redirect_uri).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", error.code());
        pairs.append_pair("error_description", error.description());
        if let Some(state) = state {
            pairs.append_pair("state", state);
        }
    }
    Some(url.into())
}

/// Build the consent-UI path, preserving every original authorize
/// parameter so the flow resumes deterministically after the decision.
pub fn consent_url(base_path: &str, request: &AuthorizeRequest) -> String {
    let mut pairs = url::form_urlencoded::Serializer::new(String::new());
    pairs.append_pair("client_id", &request.client_id);
    pairs.append_pair("redirect_uri", &request.redirect_uri);
    if let Some(scope) = &request.scope {
        pairs.append_pair("scope", scope);
    }
    if let Some(state) = &request.state {
        pairs.append_pair("state", state);
    }
    if let Some(challenge) = &request.code_challenge {
        pairs.append_pair("code_challenge", challenge);
        if let Some(method) = &request.code_challenge_method {
            pairs.append_pair("code_challenge_method", method);
        }
    }
    format!("{}?{}", base_path, pairs.finish())
}
