// PostgreSQL OAuth token store. Revocations are UPDATEs that match zero
// or more rows, so they are idempotent by construction; revoked rows
// stay queryable for reuse detection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::{OAuthAccessToken, OAuthRefreshToken, Page, PageQuery};
use verigate_core::store::OAuthTokenStore;

use crate::db_error;

const ACCESS_COLUMNS: &str =
    "token_id, token_hash, client_id, user_id, scope, expires_at, created_at, is_revoked";
const REFRESH_COLUMNS: &str = "token_id, token_hash, access_token_id, client_id, user_id, \
     scope, expires_at, created_at, is_revoked";

#[derive(Debug, sqlx::FromRow)]
struct AccessRow {
    token_id: String,
    token_hash: String,
    client_id: String,
    user_id: i64,
    scope: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_revoked: bool,
}

impl From<AccessRow> for OAuthAccessToken {
    fn from(row: AccessRow) -> Self {
        Self {
            token_id: row.token_id,
            token_hash: row.token_hash,
            client_id: row.client_id,
            user_id: row.user_id,
            scope: row.scope,
            expires_at: row.expires_at,
            created_at: row.created_at,
            is_revoked: row.is_revoked,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshRow {
    token_id: String,
    token_hash: String,
    access_token_id: Option<String>,
    client_id: String,
    user_id: i64,
    scope: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_revoked: bool,
}

impl From<RefreshRow> for OAuthRefreshToken {
    fn from(row: RefreshRow) -> Self {
        Self {
            token_id: row.token_id,
            token_hash: row.token_hash,
            access_token_id: row.access_token_id,
            client_id: row.client_id,
            user_id: row.user_id,
            scope: row.scope,
            expires_at: row.expires_at,
            created_at: row.created_at,
            is_revoked: row.is_revoked,
        }
    }
}

#[derive(Clone)]
pub struct PgOAuthTokenStore {
    pool: PgPool,
}

impl PgOAuthTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_access(
        &self,
        filter_column: &str,
        bind_user: Option<i64>,
        bind_client: Option<&str>,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>> {
        let page = page.normalized();

        let count_query = format!("SELECT COUNT(*) FROM access_tokens WHERE {filter_column} = $1");
        let list_query = format!(
            "SELECT {ACCESS_COLUMNS} FROM access_tokens WHERE {filter_column} = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );

        let (total, rows): (i64, Vec<AccessRow>) = if let Some(user_id) = bind_user {
            let (total,): (i64,) = sqlx::query_as(&count_query)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
            let rows = sqlx::query_as(&list_query)
                .bind(user_id)
                .bind(page.limit as i64)
                .bind(page.offset() as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            (total, rows)
        } else {
            let client_id = bind_client.unwrap_or_default();
            let (total,): (i64,) = sqlx::query_as(&count_query)
                .bind(client_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
            let rows = sqlx::query_as(&list_query)
                .bind(client_id)
                .bind(page.limit as i64)
                .bind(page.offset() as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
            (total, rows)
        };

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total: total as u64,
            page: page.page,
            per_page: page.limit,
        })
    }
}

#[async_trait]
impl OAuthTokenStore for PgOAuthTokenStore {
    async fn insert_access(&self, _ctx: &RequestContext, token: &OAuthAccessToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO access_tokens (token_id, token_hash, client_id, user_id, scope, \
             expires_at, created_at, is_revoked) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&token.token_id)
        .bind(&token.token_hash)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(&token.scope)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.is_revoked)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn insert_refresh(&self, _ctx: &RequestContext, token: &OAuthRefreshToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token_id, token_hash, access_token_id, client_id, \
             user_id, scope, expires_at, created_at, is_revoked) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&token.token_id)
        .bind(&token.token_hash)
        .bind(&token.access_token_id)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(&token.scope)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.is_revoked)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_access_by_id(
        &self,
        _ctx: &RequestContext,
        token_id: &str,
    ) -> Result<Option<OAuthAccessToken>> {
        let query = format!("SELECT {ACCESS_COLUMNS} FROM access_tokens WHERE token_id = $1");
        let row: Option<AccessRow> = sqlx::query_as(&query)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_refresh_by_hash(
        &self,
        _ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>> {
        let query = format!("SELECT {REFRESH_COLUMNS} FROM refresh_tokens WHERE token_hash = $1");
        let row: Option<RefreshRow> = sqlx::query_as(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn list_access_by_user(
        &self,
        _ctx: &RequestContext,
        user_id: i64,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>> {
        self.list_access("user_id", Some(user_id), None, page).await
    }

    async fn list_access_by_client(
        &self,
        _ctx: &RequestContext,
        client_id: &str,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>> {
        self.list_access("client_id", None, Some(client_id), page)
            .await
    }

    async fn revoke_access(&self, _ctx: &RequestContext, token_id: &str) -> Result<()> {
        sqlx::query("UPDATE access_tokens SET is_revoked = TRUE WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn revoke_refresh(&self, _ctx: &RequestContext, token_id: &str) -> Result<()> {
        sqlx::query("UPDATE refresh_tokens SET is_revoked = TRUE WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, _ctx: &RequestContext, user_id: i64) -> Result<Vec<String>> {
        let touched: Vec<(String,)> = sqlx::query_as(
            "UPDATE access_tokens SET is_revoked = TRUE WHERE user_id = $1 RETURNING token_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        sqlx::query("UPDATE refresh_tokens SET is_revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(touched.into_iter().map(|(id,)| id).collect())
    }

    async fn revoke_all_for_client(
        &self,
        _ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Vec<String>> {
        let touched: Vec<(String,)> = sqlx::query_as(
            "UPDATE access_tokens SET is_revoked = TRUE WHERE client_id = $1 RETURNING token_id",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        sqlx::query("UPDATE refresh_tokens SET is_revoked = TRUE WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(touched.into_iter().map(|(id,)| id).collect())
    }

    async fn revoke_all_for_user_client(
        &self,
        _ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<Vec<String>> {
        let touched: Vec<(String,)> = sqlx::query_as(
            "UPDATE access_tokens SET is_revoked = TRUE \
             WHERE user_id = $1 AND client_id = $2 RETURNING token_id",
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = TRUE WHERE user_id = $1 AND client_id = $2",
        )
        .bind(user_id)
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(touched.into_iter().map(|(id,)| id).collect())
    }

    async fn revoke_refresh_by_access_id(
        &self,
        _ctx: &RequestContext,
        access_token_id: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE refresh_tokens SET is_revoked = TRUE WHERE access_token_id = $1")
            .bind(access_token_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn is_access_revoked(&self, _ctx: &RequestContext, token_id: &str) -> Result<bool> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_revoked FROM access_tokens WHERE token_id = $1")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|(revoked,)| revoked).unwrap_or(false))
    }
}
