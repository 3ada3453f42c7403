// Web-session authentication (management API realm).
//
// Issues access/refresh pairs with `iss = "verigate-web"` so they can
// never be confused with OAuth tokens. Refresh tokens rotate on every
// use; presenting an already-revoked refresh token kills the whole
// family, because a revoked token arriving means it was stolen and used.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use verigate_core::context::RequestContext;
use verigate_core::logger::Logger;
use verigate_core::model::WebRefreshToken;
use verigate_core::store::WebSessionStore;
use verigate_core::AppError;

use crate::crypto::jwt::{AccessClaims, SigningKeys, ISSUER_WEB, TOKEN_TYPE_ACCESS};
use crate::crypto::random;
use crate::crypto::token_hash::TokenHasher;

/// A freshly minted session token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct WebSessionService {
    store: Arc<dyn WebSessionStore>,
    keys: Arc<SigningKeys>,
    hasher: TokenHasher,
    access_ttl: Duration,
    refresh_ttl: Duration,
    logger: Logger,
}

impl WebSessionService {
    pub fn new(
        store: Arc<dyn WebSessionStore>,
        keys: Arc<SigningKeys>,
        hasher: TokenHasher,
        access_ttl: Duration,
        refresh_ttl: Duration,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            keys,
            hasher,
            access_ttl,
            refresh_ttl,
            logger,
        }
    }

    /// Mint an access JWT plus an opaque refresh token. Only the hash of
    /// the refresh token is persisted; user agent and IP from the context
    /// are captured for audit.
    pub async fn create_pair(
        &self,
        ctx: &RequestContext,
        user_id: i64,
    ) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;

        let claims = AccessClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_id,
            aud: None,
            scope: None,
            iat: now.timestamp(),
            exp: access_expires_at.timestamp(),
            iss: ISSUER_WEB.to_string(),
            token_type: TOKEN_TYPE_ACCESS.to_string(),
        };
        let access_token = self.keys.sign(&claims)?;

        let refresh_token = random::refresh_token();
        let refresh_expires_at = now + self.refresh_ttl;

        self.store
            .insert(
                ctx,
                &WebRefreshToken {
                    token_id: uuid::Uuid::new_v4().to_string(),
                    token_hash: self.hasher.hash(&refresh_token),
                    user_id,
                    expires_at: refresh_expires_at,
                    created_at: now,
                    is_revoked: false,
                    user_agent: ctx.user_agent.clone(),
                    ip_address: ctx.ip_address.clone(),
                },
            )
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Refresh token rotation with reuse detection.
    ///
    /// The presented token is revoked before the replacement is minted,
    /// so a concurrent second use observes the revocation and trips the
    /// family kill.
    pub async fn refresh(&self, ctx: &RequestContext, refresh_token: &str) -> Result<TokenPair, AppError> {
        let hash = self.hasher.hash(refresh_token);
        let token = self
            .store
            .find_by_hash(ctx, &hash)
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid refresh token"))?;

        if token.is_revoked {
            // Reuse detected: someone presented a token that was already
            // rotated away. Revoke the whole family.
            if let Err(err) = self.store.revoke_all_for_user(ctx, token.user_id).await {
                self.logger.warn(&format!(
                    "family kill after refresh token reuse failed for user {}: {err}",
                    token.user_id
                ));
            } else {
                self.logger.warn(&format!(
                    "refresh token reuse detected; revoked all sessions of user {}",
                    token.user_id
                ));
            }
            return Err(AppError::unauthorized("invalid refresh token"));
        }

        if Utc::now() > token.expires_at {
            return Err(AppError::unauthorized("refresh token has expired"));
        }

        self.store.revoke(ctx, &token.token_id).await?;
        self.create_pair(ctx, token.user_id).await
    }

    /// Validate a session access JWT: signature, expiry, issuer, and
    /// token type. Returns the subject.
    pub fn validate_access(&self, access_token: &str) -> Result<i64, AppError> {
        let claims = self.keys.verify_access(access_token, ISSUER_WEB)?;
        Ok(claims.sub)
    }

    /// Revoke every refresh token the user holds (logout everywhere).
    pub async fn revoke_all(&self, ctx: &RequestContext, user_id: i64) -> Result<(), AppError> {
        self.store.revoke_all_for_user(ctx, user_id).await
    }
}
