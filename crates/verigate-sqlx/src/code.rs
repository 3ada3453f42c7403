// PostgreSQL authorization code store.
//
// `consume` is the one operation that must be atomic: the UPDATE only
// matches while is_used is still false, so of any number of concurrent
// exchanges exactly one gets the row back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::AuthorizationCode;
use verigate_core::store::AuthCodeStore;

use crate::db_error;

const CODE_COLUMNS: &str = "code, client_id, user_id, redirect_uri, scope, code_challenge, \
     code_challenge_method, expires_at, created_at, is_used";

#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    code: String,
    client_id: String,
    user_id: i64,
    redirect_uri: String,
    scope: String,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_used: bool,
}

impl From<CodeRow> for AuthorizationCode {
    fn from(row: CodeRow) -> Self {
        Self {
            code: row.code,
            client_id: row.client_id,
            user_id: row.user_id,
            redirect_uri: row.redirect_uri,
            scope: row.scope,
            code_challenge: row.code_challenge,
            code_challenge_method: row.code_challenge_method,
            expires_at: row.expires_at,
            created_at: row.created_at,
            is_used: row.is_used,
        }
    }
}

#[derive(Clone)]
pub struct PgAuthCodeStore {
    pool: PgPool,
}

impl PgAuthCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthCodeStore for PgAuthCodeStore {
    async fn insert(&self, _ctx: &RequestContext, code: &AuthorizationCode) -> Result<()> {
        sqlx::query(
            "INSERT INTO authorization_codes (code, client_id, user_id, redirect_uri, scope, \
             code_challenge, code_challenge_method, expires_at, created_at, is_used) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(&code.scope)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(code.expires_at)
        .bind(code.created_at)
        .bind(code.is_used)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_by_code(
        &self,
        _ctx: &RequestContext,
        code: &str,
    ) -> Result<Option<AuthorizationCode>> {
        let query = format!("SELECT {CODE_COLUMNS} FROM authorization_codes WHERE code = $1");
        let row: Option<CodeRow> = sqlx::query_as(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn consume(
        &self,
        _ctx: &RequestContext,
        code: &str,
    ) -> Result<Option<AuthorizationCode>> {
        let query = format!(
            "UPDATE authorization_codes SET is_used = TRUE \
             WHERE code = $1 AND is_used = FALSE \
             RETURNING {CODE_COLUMNS}"
        );
        let row: Option<CodeRow> = sqlx::query_as(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn delete_expired(&self, _ctx: &RequestContext) -> Result<u64> {
        let result = sqlx::query("DELETE FROM authorization_codes WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}
