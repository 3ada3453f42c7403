// Per-request context.
//
// Every core operation takes the context as its first argument so the
// authenticated subject never travels implicitly. The boundary builds it
// from the authentication extractors; cancellation rides on the request
// future itself (dropping the future aborts in-flight work).

use serde::{Deserialize, Serialize};

/// Who is driving this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    /// Nobody authenticated (register, login, token endpoint pre-auth).
    Anonymous,
    /// A web-session user (management API realm).
    SessionUser { user_id: i64 },
    /// An OAuth bearer token (resource realm).
    BearerToken {
        user_id: i64,
        client_id: String,
        scope: String,
    },
    /// An authenticated OAuth client (token / revoke endpoints).
    OAuthClient { client_id: String },
}

/// Context threaded through every service and store call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub principal: Principal,
    /// Client user agent, captured for session audit.
    pub user_agent: Option<String>,
    /// Remote address, captured for session audit.
    pub ip_address: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self {
            principal: Principal::Anonymous,
            user_agent: None,
            ip_address: None,
        }
    }

    pub fn session(user_id: i64) -> Self {
        Self {
            principal: Principal::SessionUser { user_id },
            user_agent: None,
            ip_address: None,
        }
    }

    pub fn bearer(user_id: i64, client_id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            principal: Principal::BearerToken {
                user_id,
                client_id: client_id.into(),
                scope: scope.into(),
            },
            user_agent: None,
            ip_address: None,
        }
    }

    pub fn oauth_client(client_id: impl Into<String>) -> Self {
        Self {
            principal: Principal::OAuthClient {
                client_id: client_id.into(),
            },
            user_agent: None,
            ip_address: None,
        }
    }

    pub fn with_audit(mut self, user_agent: Option<String>, ip_address: Option<String>) -> Self {
        self.user_agent = user_agent;
        self.ip_address = ip_address;
        self
    }

    /// The authenticated user id, regardless of realm.
    pub fn user_id(&self) -> Option<i64> {
        match &self.principal {
            Principal::SessionUser { user_id } | Principal::BearerToken { user_id, .. } => {
                Some(*user_id)
            }
            _ => None,
        }
    }
}
