// Redis-backed web-session refresh token store.
//
// Three key families:
//   web:refresh:{token_id}      -> token record (JSON), expires with the token
//   web:refresh_hash:{hash}     -> token_id, for exact lookup by presented value
//   web:user_tokens:{user_id}   -> set of the user's token ids, for the family kill
//
// Expiry is Redis-native, so expired sessions disappear without a
// sweeper; the deterministic lookup hash makes the by-value lookup a
// single GET instead of a scan.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::WebRefreshToken;
use verigate_core::store::WebSessionStore;
use verigate_core::AppError;

fn token_key(token_id: &str) -> String {
    format!("web:refresh:{token_id}")
}

fn hash_key(token_hash: &str) -> String {
    format!("web:refresh_hash:{token_hash}")
}

fn user_key(user_id: i64) -> String {
    format!("web:user_tokens:{user_id}")
}

fn redis_error(err: redis::RedisError) -> AppError {
    AppError::unavailable(format!("session store error: {err}"))
}

#[derive(Clone)]
pub struct RedisWebSessionStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisWebSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWebSessionStore").finish_non_exhaustive()
    }
}

impl RedisWebSessionStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn load(&self, token_id: &str) -> Result<Option<WebRefreshToken>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(token_key(token_id)).await.map_err(redis_error)?;
        match data {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AppError::internal(format!("corrupt session record: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(&self, token: &WebRefreshToken, ttl_seconds: u64) -> Result<()> {
        let json = serde_json::to_string(token)
            .map_err(|e| AppError::internal(format!("session encode failed: {e}")))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(token_key(&token.token_id), json, ttl_seconds)
            .await
            .map_err(redis_error)
    }

    fn ttl_seconds(token: &WebRefreshToken) -> u64 {
        (token.expires_at - Utc::now()).num_seconds().max(1) as u64
    }
}

#[async_trait]
impl WebSessionStore for RedisWebSessionStore {
    async fn insert(&self, _ctx: &RequestContext, token: &WebRefreshToken) -> Result<()> {
        let ttl = Self::ttl_seconds(token);
        self.save(token, ttl).await?;

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(hash_key(&token.token_hash), token.token_id.clone(), ttl)
            .await
            .map_err(redis_error)?;
        conn.sadd::<_, _, ()>(user_key(token.user_id), token.token_id.clone())
            .await
            .map_err(redis_error)?;
        // Keep the index alive as long as its youngest member.
        conn.expire_at::<_, ()>(user_key(token.user_id), token.expires_at.timestamp())
            .await
            .map_err(redis_error)?;
        Ok(())
    }

    async fn find_by_hash(
        &self,
        _ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<WebRefreshToken>> {
        let mut conn = self.conn.clone();
        let token_id: Option<String> =
            conn.get(hash_key(token_hash)).await.map_err(redis_error)?;
        let Some(token_id) = token_id else {
            return Ok(None);
        };

        match self.load(&token_id).await? {
            Some(mut token) => {
                // The hash is not stored inside the record; restore it
                // from the lookup key.
                token.token_hash = token_hash.to_string();
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    async fn revoke(&self, _ctx: &RequestContext, token_id: &str) -> Result<()> {
        // Expired-and-gone is the same as revoked.
        let Some(mut token) = self.load(token_id).await? else {
            return Ok(());
        };
        if token.is_revoked {
            return Ok(());
        }
        token.is_revoked = true;
        self.save(&token, Self::ttl_seconds(&token)).await
    }

    async fn revoke_all_for_user(&self, ctx: &RequestContext, user_id: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let token_ids: Vec<String> = conn.smembers(user_key(user_id)).await.map_err(redis_error)?;
        for token_id in token_ids {
            self.revoke(ctx, &token_id).await?;
        }
        Ok(())
    }
}
