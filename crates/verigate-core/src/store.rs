// Persistence contracts.
//
// One trait per entity family, implemented by the memory and sqlx
// backends. All operations take the request context first and return
// `AppError` on failure; "not found" is `Ok(None)` for lookups so the
// services decide the error kind.

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::model::{
    AuthorizationCode, Client, OAuthAccessToken, OAuthRefreshToken, Page, PageQuery, Scope, User,
    UserConsent, WebRefreshToken,
};

/// Fields a user may change about their own profile.
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub full_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub phone_number: Option<String>,
}

/// User accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, user: &User) -> Result<User>;
    async fn find_by_id(&self, ctx: &RequestContext, id: i64) -> Result<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_by_username(&self, ctx: &RequestContext, username: &str)
        -> Result<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, ctx: &RequestContext, email: &str) -> Result<Option<User>>;
    async fn update_profile(
        &self,
        ctx: &RequestContext,
        id: i64,
        update: &UserProfileUpdate,
    ) -> Result<()>;
    async fn update_password(
        &self,
        ctx: &RequestContext,
        id: i64,
        password_hash: &str,
    ) -> Result<()>;
    async fn update_last_login(&self, ctx: &RequestContext, id: i64) -> Result<()>;
    async fn delete(&self, ctx: &RequestContext, id: i64) -> Result<()>;
}

/// OAuth client registrations.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, client: &Client) -> Result<Client>;
    async fn find_by_id(&self, ctx: &RequestContext, id: i64) -> Result<Option<Client>>;
    async fn find_by_client_id(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Option<Client>>;
    async fn find_by_owner(
        &self,
        ctx: &RequestContext,
        owner_id: i64,
        page: PageQuery,
    ) -> Result<Page<Client>>;
    async fn update(&self, ctx: &RequestContext, client: &Client) -> Result<()>;
    async fn delete(&self, ctx: &RequestContext, id: i64) -> Result<()>;
}

/// Authorization codes.
#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, code: &AuthorizationCode) -> Result<()>;
    async fn find_by_code(
        &self,
        ctx: &RequestContext,
        code: &str,
    ) -> Result<Option<AuthorizationCode>>;
    /// Atomically flip `is_used` from false to true and return the row.
    ///
    /// `Ok(None)` means the code is missing or was already consumed; the
    /// read and the write are one indivisible step, so concurrent
    /// exchanges of the same code succeed at most once.
    async fn consume(&self, ctx: &RequestContext, code: &str)
        -> Result<Option<AuthorizationCode>>;
    /// Remove expired codes; returns the number deleted.
    async fn delete_expired(&self, ctx: &RequestContext) -> Result<u64>;
}

/// Per-(user, client) consent grants.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Insert or replace the stored scope set for (user, client).
    async fn upsert(&self, ctx: &RequestContext, consent: &UserConsent) -> Result<()>;
    async fn find(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<Option<UserConsent>>;
    async fn delete(&self, ctx: &RequestContext, user_id: i64, client_id: &str) -> Result<()>;
}

/// OAuth access and refresh token records.
///
/// Revoked rows stay queryable until TTL expiry so reuse can be detected.
/// Bulk revocations are idempotent and never fail on "already revoked".
#[async_trait]
pub trait OAuthTokenStore: Send + Sync {
    async fn insert_access(&self, ctx: &RequestContext, token: &OAuthAccessToken) -> Result<()>;
    async fn insert_refresh(&self, ctx: &RequestContext, token: &OAuthRefreshToken) -> Result<()>;

    async fn find_access_by_id(
        &self,
        ctx: &RequestContext,
        token_id: &str,
    ) -> Result<Option<OAuthAccessToken>>;
    async fn find_refresh_by_hash(
        &self,
        ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>>;

    async fn list_access_by_user(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>>;
    async fn list_access_by_client(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>>;

    async fn revoke_access(&self, ctx: &RequestContext, token_id: &str) -> Result<()>;
    async fn revoke_refresh(&self, ctx: &RequestContext, token_id: &str) -> Result<()>;
    /// Bulk revocations return the ids of the access tokens they touched
    /// so the caller can evict the matching cache entries.
    async fn revoke_all_for_user(&self, ctx: &RequestContext, user_id: i64) -> Result<Vec<String>>;
    async fn revoke_all_for_client(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Vec<String>>;
    /// Revoke every token issued to the (user, client) pair. Used when a
    /// consumed authorization code is replayed.
    async fn revoke_all_for_user_client(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<Vec<String>>;
    /// Revoke every refresh token whose sibling is the given access token.
    async fn revoke_refresh_by_access_id(
        &self,
        ctx: &RequestContext,
        access_token_id: &str,
    ) -> Result<()>;

    async fn is_access_revoked(&self, ctx: &RequestContext, token_id: &str) -> Result<bool>;
}

/// Web-session refresh tokens (management API realm).
#[async_trait]
pub trait WebSessionStore: Send + Sync {
    async fn insert(&self, ctx: &RequestContext, token: &WebRefreshToken) -> Result<()>;
    async fn find_by_hash(
        &self,
        ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<WebRefreshToken>>;
    async fn revoke(&self, ctx: &RequestContext, token_id: &str) -> Result<()>;
    /// Family kill: revoke every web refresh token the user holds.
    async fn revoke_all_for_user(&self, ctx: &RequestContext, user_id: i64) -> Result<()>;
}

/// The scope catalog.
#[async_trait]
pub trait ScopeStore: Send + Sync {
    async fn find_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Option<Scope>>;
    async fn find_by_names(&self, ctx: &RequestContext, names: &[String]) -> Result<Vec<Scope>>;
    async fn find_defaults(&self, ctx: &RequestContext) -> Result<Vec<Scope>>;
    async fn find_all(&self, ctx: &RequestContext) -> Result<Vec<Scope>>;
}
