//! The RFC 6749 protocol error set.

use std::fmt;

use serde::{Deserialize, Serialize};
use verigate_core::{AppError, ErrorKind};

/// OAuth protocol error codes (RFC 6749 §4.1.2.1 and §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    UnsupportedResponseType,
    InvalidScope,
    AccessDenied,
    ServerError,
}

impl OAuthErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request is missing a required parameter",
            Self::InvalidClient => "Client authentication failed",
            Self::InvalidGrant => "The provided grant is invalid",
            Self::UnauthorizedClient => "The client is not authorized for this grant type",
            Self::UnsupportedGrantType => "The grant type is not supported",
            Self::UnsupportedResponseType => "The response type is not supported",
            Self::InvalidScope => "The requested scope is invalid",
            Self::AccessDenied => "The resource owner denied the request",
            Self::ServerError => "The server encountered an unexpected error",
        }
    }

    /// HTTP status for a direct (non-redirect) error response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::ServerError => 500,
            _ => 400,
        }
    }
}

/// A protocol error with an optional specific description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthError {
    pub kind: OAuthErrorKind,
    pub description: Option<String>,
}

impl OAuthError {
    pub fn new(kind: OAuthErrorKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn with_description(kind: OAuthErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: Some(description.into()),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::with_description(OAuthErrorKind::InvalidRequest, description)
    }

    pub fn invalid_client() -> Self {
        Self::new(OAuthErrorKind::InvalidClient)
    }

    pub fn invalid_grant() -> Self {
        Self::new(OAuthErrorKind::InvalidGrant)
    }

    pub fn invalid_scope() -> Self {
        Self::new(OAuthErrorKind::InvalidScope)
    }

    pub fn unsupported_grant_type() -> Self {
        Self::new(OAuthErrorKind::UnsupportedGrantType)
    }

    pub fn unsupported_response_type() -> Self {
        Self::new(OAuthErrorKind::UnsupportedResponseType)
    }

    pub fn access_denied() -> Self {
        Self::new(OAuthErrorKind::AccessDenied)
    }

    pub fn server_error() -> Self {
        Self::new(OAuthErrorKind::ServerError)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// The specific description if set, the generic one otherwise.
    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or_else(|| self.kind.description())
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

impl std::error::Error for OAuthError {}

/// Remap an internal error onto the protocol set at the boundary.
///
/// Grant-shaped failures (missing, expired, revoked, wrong owner) all
/// collapse to `invalid_grant` so callers cannot probe token state.
impl From<AppError> for OAuthError {
    fn from(err: AppError) -> Self {
        let kind = match err.kind {
            ErrorKind::InvalidClient => OAuthErrorKind::InvalidClient,
            ErrorKind::BadRequest | ErrorKind::Unprocessable => OAuthErrorKind::InvalidRequest,
            ErrorKind::Unauthorized | ErrorKind::Forbidden | ErrorKind::NotFound => {
                OAuthErrorKind::InvalidGrant
            }
            _ => OAuthErrorKind::ServerError,
        };
        Self {
            kind,
            description: match kind {
                // Do not leak internal messages through server_error
                OAuthErrorKind::ServerError => None,
                _ => Some(err.message),
            },
        }
    }
}
