// OAuth token service.
//
// Issues access/refresh pairs with `iss = "oauth-server"`, rotates
// refresh tokens, tracks revocation, and keeps a cache entry per access
// token so validation normally avoids the store. The cache is an
// optimization only: every cache failure degrades to a store lookup.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use verigate_core::cache::{oauth_access_key, Cache};
use verigate_core::context::RequestContext;
use verigate_core::logger::Logger;
use verigate_core::model::{OAuthAccessToken, OAuthRefreshToken, Page, PageQuery};
use verigate_core::store::OAuthTokenStore;
use verigate_core::AppError;
use verigate_oauth::error::OAuthError;
use verigate_oauth::scope;
use verigate_oauth::types::TokenResponse;

use crate::crypto::jwt::{self, AccessClaims, SigningKeys, ISSUER_OAUTH, TOKEN_TYPE_ACCESS};
use crate::crypto::random;
use crate::crypto::token_hash::TokenHasher;

const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Cache payload for an access token, keyed by `jti`.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAccessToken {
    token_id: String,
    user_id: i64,
    client_id: String,
    scope: String,
    expires_at: DateTime<Utc>,
    is_revoked: bool,
}

impl From<&OAuthAccessToken> for CachedAccessToken {
    fn from(token: &OAuthAccessToken) -> Self {
        Self {
            token_id: token.token_id.clone(),
            user_id: token.user_id,
            client_id: token.client_id.clone(),
            scope: token.scope.clone(),
            expires_at: token.expires_at,
            is_revoked: token.is_revoked,
        }
    }
}

/// Token metadata exposed on the management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: String,
    pub client_id: String,
    pub user_id: i64,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_revoked: bool,
}

#[derive(Clone)]
pub struct OAuthTokenService {
    store: Arc<dyn OAuthTokenStore>,
    cache: Arc<dyn Cache>,
    keys: Arc<SigningKeys>,
    hasher: TokenHasher,
    access_ttl: Duration,
    refresh_ttl: Duration,
    logger: Logger,
}

impl OAuthTokenService {
    pub fn new(
        store: Arc<dyn OAuthTokenStore>,
        cache: Arc<dyn Cache>,
        keys: Arc<SigningKeys>,
        hasher: TokenHasher,
        access_ttl: Duration,
        refresh_ttl: Duration,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            cache,
            keys,
            hasher,
            access_ttl,
            refresh_ttl,
            logger,
        }
    }

    /// Mint an access JWT and an opaque refresh token bound to
    /// (user, client, scope). Both rows are persisted before the pair is
    /// returned; the cache write is best-effort.
    pub async fn create_pair(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
        scope_str: &str,
    ) -> Result<TokenResponse, AppError> {
        let now = Utc::now();
        let access_token_id = uuid::Uuid::new_v4().to_string();
        let access_expires_at = now + self.access_ttl;

        let claims = AccessClaims {
            jti: access_token_id.clone(),
            sub: user_id,
            aud: Some(client_id.to_string()),
            scope: Some(scope_str.to_string()),
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            iss: ISSUER_OAUTH.to_string(),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
        };
        let access_token = self.keys.sign(&claims)?;

        let access_row = OAuthAccessToken {
            token_id: access_token_id.clone(),
            token_hash: self.hasher.hash(&access_token),
            client_id: client_id.to_string(),
            user_id,
            scope: scope_str.to_string(),
            expires_at: access_expires_at,
            created_at: now,
            is_revoked: false,
        };
        self.store.insert_access(ctx, &access_row).await?;

        let refresh_token = random::refresh_token();
        self.store
            .insert_refresh(
                ctx,
                &OAuthRefreshToken {
                    token_id: uuid::Uuid::new_v4().to_string(),
                    token_hash: self.hasher.hash(&refresh_token),
                    access_token_id: Some(access_token_id.clone()),
                    client_id: client_id.to_string(),
                    user_id,
                    scope: scope_str.to_string(),
                    expires_at: now + self.refresh_ttl,
                    created_at: now,
                    is_revoked: false,
                },
            )
            .await?;

        self.cache_access(&access_row).await;

        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_ttl.num_seconds(),
            refresh_token: Some(refresh_token),
            scope: Some(scope_str.to_string()),
        })
    }

    /// Exchange a refresh token for a fresh pair (refresh token
    /// rotation). The presented token is revoked before the new pair is
    /// minted; its sibling access token is revoked best-effort.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
        client_id: &str,
        requested_scope: Option<&str>,
    ) -> Result<TokenResponse, OAuthError> {
        let hash = self.hasher.hash(refresh_token);
        let token = self
            .store
            .find_refresh_by_hash(ctx, &hash)
            .await
            .map_err(|err| self.storage_failure("refresh token lookup", err))?
            .ok_or_else(OAuthError::invalid_grant)?;

        if token.is_revoked {
            self.logger.warn(&format!(
                "revoked oauth refresh token presented for client {}",
                token.client_id
            ));
            return Err(OAuthError::invalid_grant());
        }
        if Utc::now() > token.expires_at {
            return Err(OAuthError::invalid_grant());
        }
        if token.client_id != client_id {
            return Err(OAuthError::invalid_grant());
        }

        // Scope non-escalation: an explicit request must stay within the
        // original grant; an empty request keeps it.
        let new_scope = match requested_scope.filter(|s| !s.is_empty()) {
            Some(requested) => {
                if !scope::is_subset(requested, &token.scope) {
                    return Err(OAuthError::invalid_scope());
                }
                requested.to_string()
            }
            None => token.scope.clone(),
        };

        self.store
            .revoke_refresh(ctx, &token.token_id)
            .await
            .map_err(|err| self.storage_failure("refresh token rotation", err))?;

        if let Some(access_token_id) = &token.access_token_id {
            self.revoke_access_best_effort(ctx, access_token_id).await;
        }

        self.create_pair(ctx, token.user_id, &token.client_id, &new_scope)
            .await
            .map_err(|err| self.storage_failure("token pair mint", err))
    }

    /// RFC 7009 revocation of an access token. The JWT is parsed without
    /// signature verification just to learn its `jti`; the ownership
    /// check against the stored row is what authorizes the revocation.
    pub async fn revoke_access(
        &self,
        ctx: &RequestContext,
        access_token: &str,
        client_id: &str,
    ) -> Result<(), AppError> {
        let claims = jwt::decode_unverified(access_token)?;

        let row = self
            .store
            .find_access_by_id(ctx, &claims.jti)
            .await?
            .ok_or_else(|| AppError::not_found("token not found"))?;
        if row.client_id != client_id {
            return Err(AppError::forbidden("token does not belong to client"));
        }

        self.store.revoke_access(ctx, &row.token_id).await?;
        self.evict_access(&row.token_id).await;
        Ok(())
    }

    /// RFC 7009 revocation of a refresh token, plus best-effort
    /// revocation of its sibling access token.
    pub async fn revoke_refresh(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
        client_id: &str,
    ) -> Result<(), AppError> {
        let hash = self.hasher.hash(refresh_token);
        let row = self
            .store
            .find_refresh_by_hash(ctx, &hash)
            .await?
            .ok_or_else(|| AppError::not_found("token not found"))?;
        if row.client_id != client_id {
            return Err(AppError::forbidden("token does not belong to client"));
        }

        self.store.revoke_refresh(ctx, &row.token_id).await?;
        if let Some(access_token_id) = &row.access_token_id {
            self.revoke_access_best_effort(ctx, access_token_id).await;
        }
        Ok(())
    }

    /// Validate an OAuth access JWT: signature, expiry, issuer, type,
    /// then the revocation flag (cache first, store on miss).
    pub async fn validate_access(
        &self,
        ctx: &RequestContext,
        access_token: &str,
    ) -> Result<AccessClaims, AppError> {
        let claims = self.keys.verify_access(access_token, ISSUER_OAUTH)?;

        let revoked = match self.cached_access(&claims.jti).await {
            Some(cached) => cached.is_revoked,
            None => self.store.is_access_revoked(ctx, &claims.jti).await?,
        };
        if revoked {
            return Err(AppError::unauthorized("token has been revoked"));
        }

        Ok(claims)
    }

    /// Paginated listing of a user's access tokens for the management API.
    pub async fn list_for_user(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        page: PageQuery,
    ) -> Result<Page<TokenInfo>, AppError> {
        let rows = self.store.list_access_by_user(ctx, user_id, page).await?;
        Ok(Page {
            items: rows
                .items
                .iter()
                .map(|t| TokenInfo {
                    token_id: t.token_id.clone(),
                    client_id: t.client_id.clone(),
                    user_id: t.user_id,
                    scope: t.scope.clone(),
                    expires_at: t.expires_at,
                    created_at: t.created_at,
                    is_revoked: t.is_revoked,
                })
                .collect(),
            total: rows.total,
            page: rows.page,
            per_page: rows.per_page,
        })
    }

    /// Revoke a single access token on behalf of its owning user.
    pub async fn revoke_for_user(
        &self,
        ctx: &RequestContext,
        token_id: &str,
        user_id: i64,
    ) -> Result<(), AppError> {
        let row = self
            .store
            .find_access_by_id(ctx, token_id)
            .await?
            .ok_or_else(|| AppError::not_found("token not found"))?;
        if row.user_id != user_id {
            return Err(AppError::forbidden("not authorized to revoke this token"));
        }

        self.store.revoke_access(ctx, token_id).await?;
        self.store.revoke_refresh_by_access_id(ctx, token_id).await?;
        self.evict_access(token_id).await;
        Ok(())
    }

    /// Cascade: revoke everything issued to a client (client deletion).
    pub async fn revoke_all_for_client(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> Result<(), AppError> {
        let touched = self.store.revoke_all_for_client(ctx, client_id).await?;
        self.evict_many(&touched).await;
        Ok(())
    }

    /// Cascade: revoke everything issued to a user (account deletion).
    pub async fn revoke_all_for_user(
        &self,
        ctx: &RequestContext,
        user_id: i64,
    ) -> Result<(), AppError> {
        let touched = self.store.revoke_all_for_user(ctx, user_id).await?;
        self.evict_many(&touched).await;
        Ok(())
    }

    /// Replay response: a consumed code was presented again, so burn
    /// every token held by that (user, client) pair.
    pub async fn revoke_all_for_user_client(
        &self,
        ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<(), AppError> {
        let touched = self
            .store
            .revoke_all_for_user_client(ctx, user_id, client_id)
            .await?;
        self.evict_many(&touched).await;
        Ok(())
    }

    async fn cache_access(&self, row: &OAuthAccessToken) {
        let payload = match serde_json::to_string(&CachedAccessToken::from(row)) {
            Ok(payload) => payload,
            Err(err) => {
                self.logger.warn(&format!("access token cache encode failed: {err}"));
                return;
            }
        };
        let ttl = self
            .access_ttl
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(900));
        if let Err(err) = self
            .cache
            .set(&oauth_access_key(&row.token_id), &payload, ttl)
            .await
        {
            self.logger.warn(&format!("access token cache write failed: {err}"));
        }
    }

    async fn cached_access(&self, token_id: &str) -> Option<CachedAccessToken> {
        match self.cache.get(&oauth_access_key(token_id)).await {
            Ok(Some(payload)) => serde_json::from_str(&payload).ok(),
            Ok(None) => None,
            Err(err) => {
                self.logger.warn(&format!("access token cache read failed: {err}"));
                None
            }
        }
    }

    async fn evict_access(&self, token_id: &str) {
        if let Err(err) = self.cache.delete(&oauth_access_key(token_id)).await {
            self.logger.warn(&format!("access token cache evict failed: {err}"));
        }
    }

    async fn evict_many(&self, token_ids: &[String]) {
        for token_id in token_ids {
            self.evict_access(token_id).await;
        }
    }

    async fn revoke_access_best_effort(&self, ctx: &RequestContext, token_id: &str) {
        if let Err(err) = self.store.revoke_access(ctx, token_id).await {
            self.logger.warn(&format!(
                "sibling access token revocation failed for {token_id}: {err}"
            ));
        }
        self.evict_access(token_id).await;
    }

    fn storage_failure(&self, what: &str, err: AppError) -> OAuthError {
        self.logger.error(&format!("{what} failed: {err}"));
        OAuthError::server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verigate_core::logger::LoggerConfig;
    use verigate_memory::{InMemoryCache, InMemoryOAuthTokenStore};
    use verigate_oauth::error::OAuthErrorKind;

    const PRIVATE_PEM: &str = include_str!("../../testdata/jwt_private.pem");
    const PUBLIC_PEM: &str = include_str!("../../testdata/jwt_public.pem");

    fn service() -> OAuthTokenService {
        OAuthTokenService::new(
            Arc::new(InMemoryOAuthTokenStore::new()),
            Arc::new(InMemoryCache::new()),
            Arc::new(SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).unwrap()),
            TokenHasher::new("unit-test-key"),
            Duration::minutes(15),
            Duration::days(30),
            Logger::new(LoggerConfig {
                disabled: true,
                ..Default::default()
            }),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::anonymous()
    }

    #[tokio::test]
    async fn test_create_pair_shapes_response_and_claims() {
        let service = service();
        let pair = service
            .create_pair(&ctx(), 7, "client-abc", "profile email")
            .await
            .unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(pair.scope.as_deref(), Some("profile email"));
        assert!(pair.refresh_token.is_some());

        let claims = service
            .validate_access(&ctx(), &pair.access_token)
            .await
            .unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.aud.as_deref(), Some("client-abc"));
        assert_eq!(claims.scope.as_deref(), Some("profile email"));
        assert_eq!(claims.iss, ISSUER_OAUTH);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_reuse() {
        let service = service();
        let first = service
            .create_pair(&ctx(), 7, "client-abc", "profile")
            .await
            .unwrap();
        let rt1 = first.refresh_token.unwrap();

        let second = service
            .refresh(&ctx(), &rt1, "client-abc", None)
            .await
            .unwrap();
        assert_eq!(second.scope.as_deref(), Some("profile"));

        let reuse = service.refresh(&ctx(), &rt1, "client-abc", None).await;
        assert_eq!(reuse.unwrap_err().kind, OAuthErrorKind::InvalidGrant);

        // The rotated sibling access token was revoked best-effort.
        let stale = service.validate_access(&ctx(), &first.access_token).await;
        assert!(stale.is_err());
    }

    #[tokio::test]
    async fn test_refresh_enforces_client_binding() {
        let service = service();
        let pair = service
            .create_pair(&ctx(), 7, "client-abc", "profile")
            .await
            .unwrap();
        let result = service
            .refresh(&ctx(), &pair.refresh_token.unwrap(), "client-other", None)
            .await;
        assert_eq!(result.unwrap_err().kind, OAuthErrorKind::InvalidGrant);
    }

    #[tokio::test]
    async fn test_refresh_scope_subset_rules() {
        let service = service();
        let pair = service
            .create_pair(&ctx(), 7, "client-abc", "profile email")
            .await
            .unwrap();

        let narrowed = service
            .refresh(&ctx(), &pair.refresh_token.unwrap(), "client-abc", Some("profile"))
            .await
            .unwrap();
        assert_eq!(narrowed.scope.as_deref(), Some("profile"));

        let escalated = service
            .refresh(
                &ctx(),
                &narrowed.refresh_token.unwrap(),
                "client-abc",
                Some("profile email"),
            )
            .await;
        assert_eq!(escalated.unwrap_err().kind, OAuthErrorKind::InvalidScope);
    }

    #[tokio::test]
    async fn test_revoke_access_checks_ownership() {
        let service = service();
        let pair = service
            .create_pair(&ctx(), 7, "client-abc", "profile")
            .await
            .unwrap();

        let foreign = service
            .revoke_access(&ctx(), &pair.access_token, "client-other")
            .await;
        assert!(foreign.unwrap_err().is_kind(verigate_core::ErrorKind::Forbidden));

        service
            .revoke_access(&ctx(), &pair.access_token, "client-abc")
            .await
            .unwrap();
        assert!(service
            .validate_access(&ctx(), &pair.access_token)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bulk_revocation_evicts_cache() {
        let service = service();
        let pair = service
            .create_pair(&ctx(), 7, "client-abc", "profile")
            .await
            .unwrap();

        service
            .revoke_all_for_user_client(&ctx(), 7, "client-abc")
            .await
            .unwrap();

        // Validation must observe the revocation even though the token
        // was cached at mint time.
        assert!(service
            .validate_access(&ctx(), &pair.access_token)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_and_revoke_for_user() {
        let service = service();
        let pair = service
            .create_pair(&ctx(), 7, "client-abc", "profile")
            .await
            .unwrap();
        let _other_user = service
            .create_pair(&ctx(), 8, "client-abc", "profile")
            .await
            .unwrap();

        let page = service
            .list_for_user(&ctx(), 7, PageQuery::new(1, 20))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let token_id = page.items[0].token_id.clone();

        let foreign = service.revoke_for_user(&ctx(), &token_id, 8).await;
        assert!(foreign.unwrap_err().is_kind(verigate_core::ErrorKind::Forbidden));

        service.revoke_for_user(&ctx(), &token_id, 7).await.unwrap();
        assert!(service
            .validate_access(&ctx(), &pair.access_token)
            .await
            .is_err());
    }
}
