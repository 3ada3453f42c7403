// Domain entities persisted by the stores.
//
// Wire identifiers (client_id, authorization codes, refresh tokens) are
// URL-safe base64 of cryptographically random bytes. Columns named
// `*_hash` hold a hash of the secret; the plaintext is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// End-user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Registered OAuth client application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    /// Public identifier presented on the wire.
    pub client_id: String,
    /// Present iff the client is confidential.
    #[serde(skip_serializing, default)]
    pub client_secret_hash: Option<String>,
    pub client_name: String,
    pub description: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    /// Exact-match compared against authorize requests; never empty.
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    /// Space-separated superset of scopes this client may request.
    pub scope: String,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    pub contacts: Vec<String>,
    pub is_confidential: bool,
    pub is_active: bool,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One-shot authorization code bridging the authorize and token endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub user_id: i64,
    /// The exact redirect_uri presented at authorize time.
    pub redirect_uri: String,
    /// The approved scope subset.
    pub scope: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_used: bool,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A user's stored approval for a client to request a scope set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConsent {
    pub user_id: i64,
    pub client_id: String,
    /// Space-separated set of previously granted scopes.
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Server-side record of an issued OAuth access JWT.
///
/// The JWT itself is not stored; `token_hash` is a deterministic keyed
/// hash of the full JWT string for lookup, `token_id` is its `jti`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthAccessToken {
    pub token_id: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub client_id: String,
    pub user_id: i64,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_revoked: bool,
}

/// Server-side record of an issued OAuth refresh token.
///
/// Rotated on every successful refresh: the presented token is revoked
/// before its replacement is issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthRefreshToken {
    pub token_id: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    /// The most recently issued sibling access token, if any.
    pub access_token_id: Option<String>,
    pub client_id: String,
    pub user_id: i64,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_revoked: bool,
}

/// Refresh token for the management-API session realm.
///
/// Separate family from the OAuth refresh tokens; issued only by the
/// web-session service. User agent and IP are captured for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRefreshToken {
    pub token_id: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Catalog entry enumerating a legal scope name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    pub description: String,
    pub is_default: bool,
}

/// A page of results with its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// 1-based page request with a bounded limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    pub limit: u32,
}

impl PageQuery {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }.normalized()
    }

    /// Clamp the page to >= 1 and the limit to [1, 100].
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Row offset for SQL backends.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}
