// PostgreSQL consent store. Upsert replaces the stored scope set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::UserConsent;
use verigate_core::store::ConsentStore;

use crate::db_error;

#[derive(Debug, sqlx::FromRow)]
struct ConsentRow {
    user_id: i64,
    client_id: String,
    scope: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConsentRow> for UserConsent {
    fn from(row: ConsentRow) -> Self {
        Self {
            user_id: row.user_id,
            client_id: row.client_id,
            scope: row.scope,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgConsentStore {
    pool: PgPool,
}

impl PgConsentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsentStore for PgConsentStore {
    async fn upsert(&self, _ctx: &RequestContext, consent: &UserConsent) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_consents (user_id, client_id, scope, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, client_id) \
             DO UPDATE SET scope = EXCLUDED.scope, updated_at = EXCLUDED.updated_at",
        )
        .bind(consent.user_id)
        .bind(&consent.client_id)
        .bind(&consent.scope)
        .bind(consent.created_at)
        .bind(consent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find(
        &self,
        _ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<Option<UserConsent>> {
        let row: Option<ConsentRow> = sqlx::query_as(
            "SELECT user_id, client_id, scope, created_at, updated_at \
             FROM user_consents WHERE user_id = $1 AND client_id = $2",
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, _ctx: &RequestContext, user_id: i64, client_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_consents WHERE user_id = $1 AND client_id = $2")
            .bind(user_id)
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
