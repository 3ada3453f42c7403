// Authentication extractors and client-credential parsing.
//
// `SessionAuth` guards the management API (web-session JWTs),
// `BearerAuth` guards resource endpoints (OAuth access JWTs). Client
// credentials on the token endpoint are taken from HTTP Basic first,
// then from the form body.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use verigate_core::context::RequestContext;
use verigate_core::AppError;

use crate::http::error::ApiError;
use crate::services::authorize::ClientCredentials;
use crate::state::AppState;

/// A request authenticated by a web-session access token.
#[derive(Debug, Clone)]
pub struct SessionAuth {
    pub user_id: i64,
    pub ctx: RequestContext,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError(AppError::unauthorized("missing authorization header")))?;
        let user_id = state.sessions.validate_access(&token)?;

        let ctx = RequestContext::session(user_id)
            .with_audit(header_value(parts, USER_AGENT.as_str()), client_ip(parts));
        Ok(Self { user_id, ctx })
    }
}

/// A request authenticated by an OAuth access token.
#[derive(Debug, Clone)]
pub struct BearerAuth {
    pub user_id: i64,
    pub client_id: String,
    pub scope: String,
    pub ctx: RequestContext,
}

#[async_trait]
impl FromRequestParts<AppState> for BearerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError(AppError::unauthorized("missing authorization header")))?;

        let lookup_ctx = RequestContext::anonymous();
        let claims = state.tokens.validate_access(&lookup_ctx, &token).await?;

        let client_id = claims.aud.unwrap_or_default();
        let scope = claims.scope.unwrap_or_default();
        let ctx = RequestContext::bearer(claims.sub, client_id.clone(), scope.clone());
        Ok(Self {
            user_id: claims.sub,
            client_id,
            scope,
            ctx,
        })
    }
}

/// Extract the token from a `Bearer` authorization header.
fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn client_ip(parts: &Parts) -> Option<String> {
    header_value(parts, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
}

/// Extract client credentials for the token and revocation endpoints.
///
/// HTTP Basic takes precedence; the form body fields are the fallback.
/// Malformed Basic material (bad base64, missing colon) and a missing
/// client_id both fail as InvalidClient.
pub fn client_credentials(
    parts: &axum::http::HeaderMap,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> Result<ClientCredentials, AppError> {
    if let Some(header) = parts.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(encoded) = header.strip_prefix("Basic ") {
            let decoded = STANDARD
                .decode(encoded)
                .map_err(|_| AppError::invalid_client("invalid basic auth format"))?;
            let decoded = String::from_utf8(decoded)
                .map_err(|_| AppError::invalid_client("invalid basic auth format"))?;
            let (client_id, client_secret) = decoded
                .split_once(':')
                .ok_or_else(|| AppError::invalid_client("invalid basic auth format"))?;
            if client_id.is_empty() {
                return Err(AppError::invalid_client("missing client_id"));
            }
            return Ok(ClientCredentials {
                client_id: client_id.to_string(),
                client_secret: if client_secret.is_empty() {
                    None
                } else {
                    Some(client_secret.to_string())
                },
            });
        }
    }

    let client_id = form_client_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid_client("missing client_id"))?;
    Ok(ClientCredentials {
        client_id: client_id.to_string(),
        client_secret: form_client_secret
            .filter(|s| !s.is_empty())
            .map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers_with_basic(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_auth() {
        let encoded = STANDARD.encode("abc:s3cr3t");
        let headers = headers_with_basic(&format!("Basic {encoded}"));
        let creds = client_credentials(&headers, None, None).unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_basic_auth_empty_secret_is_public() {
        let encoded = STANDARD.encode("abc:");
        let headers = headers_with_basic(&format!("Basic {encoded}"));
        let creds = client_credentials(&headers, None, None).unwrap();
        assert_eq!(creds.client_id, "abc");
        assert!(creds.client_secret.is_none());
    }

    #[test]
    fn test_basic_auth_malformed() {
        let headers = headers_with_basic("Basic not-base64!!!");
        assert!(client_credentials(&headers, None, None).is_err());

        let encoded = STANDARD.encode("no-colon-here");
        let headers = headers_with_basic(&format!("Basic {encoded}"));
        assert!(client_credentials(&headers, None, None).is_err());
    }

    #[test]
    fn test_form_fallback() {
        let headers = HeaderMap::new();
        let creds = client_credentials(&headers, Some("abc"), Some("s3cr3t")).unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_missing_client_id() {
        let headers = HeaderMap::new();
        assert!(client_credentials(&headers, None, None).is_err());
        assert!(client_credentials(&headers, Some(""), None).is_err());
    }

    #[test]
    fn test_basic_takes_precedence() {
        let encoded = STANDARD.encode("from-header:hs");
        let headers = headers_with_basic(&format!("Basic {encoded}"));
        let creds = client_credentials(&headers, Some("from-form"), Some("fs")).unwrap();
        assert_eq!(creds.client_id, "from-header");
    }
}
