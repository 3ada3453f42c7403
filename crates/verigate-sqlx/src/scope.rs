// PostgreSQL scope catalog.

use async_trait::async_trait;
use sqlx::PgPool;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::Scope;
use verigate_core::store::ScopeStore;

use crate::db_error;

#[derive(Debug, sqlx::FromRow)]
struct ScopeRow {
    name: String,
    description: String,
    is_default: bool,
}

impl From<ScopeRow> for Scope {
    fn from(row: ScopeRow) -> Self {
        Self {
            name: row.name,
            description: row.description,
            is_default: row.is_default,
        }
    }
}

#[derive(Clone)]
pub struct PgScopeStore {
    pool: PgPool,
}

impl PgScopeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeStore for PgScopeStore {
    async fn find_by_name(&self, _ctx: &RequestContext, name: &str) -> Result<Option<Scope>> {
        let row: Option<ScopeRow> =
            sqlx::query_as("SELECT name, description, is_default FROM scopes WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_names(&self, _ctx: &RequestContext, names: &[String]) -> Result<Vec<Scope>> {
        let rows: Vec<ScopeRow> = sqlx::query_as(
            "SELECT name, description, is_default FROM scopes WHERE name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_defaults(&self, _ctx: &RequestContext) -> Result<Vec<Scope>> {
        let rows: Vec<ScopeRow> = sqlx::query_as(
            "SELECT name, description, is_default FROM scopes WHERE is_default = TRUE",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_all(&self, _ctx: &RequestContext) -> Result<Vec<Scope>> {
        let rows: Vec<ScopeRow> =
            sqlx::query_as("SELECT name, description, is_default FROM scopes ORDER BY name")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
