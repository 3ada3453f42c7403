// PostgreSQL client store. URI lists and contacts are native text[].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::{Client, Page, PageQuery};
use verigate_core::store::ClientStore;

use crate::db_error;

const CLIENT_COLUMNS: &str = "id, client_id, client_secret_hash, client_name, description, \
     client_uri, logo_uri, redirect_uris, grant_types, response_types, scope, tos_uri, \
     policy_uri, contacts, is_confidential, is_active, owner_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    id: i64,
    client_id: String,
    client_secret_hash: Option<String>,
    client_name: String,
    description: Option<String>,
    client_uri: Option<String>,
    logo_uri: Option<String>,
    redirect_uris: Vec<String>,
    grant_types: Vec<String>,
    response_types: Vec<String>,
    scope: String,
    tos_uri: Option<String>,
    policy_uri: Option<String>,
    contacts: Vec<String>,
    is_confidential: bool,
    is_active: bool,
    owner_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            client_secret_hash: row.client_secret_hash,
            client_name: row.client_name,
            description: row.description,
            client_uri: row.client_uri,
            logo_uri: row.logo_uri,
            redirect_uris: row.redirect_uris,
            grant_types: row.grant_types,
            response_types: row.response_types,
            scope: row.scope,
            tos_uri: row.tos_uri,
            policy_uri: row.policy_uri,
            contacts: row.contacts,
            is_confidential: row.is_confidential,
            is_active: row.is_active,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgClientStore {
    pool: PgPool,
}

impl PgClientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStore for PgClientStore {
    async fn insert(&self, _ctx: &RequestContext, client: &Client) -> Result<Client> {
        let query = format!(
            "INSERT INTO clients (client_id, client_secret_hash, client_name, description, \
             client_uri, logo_uri, redirect_uris, grant_types, response_types, scope, tos_uri, \
             policy_uri, contacts, is_confidential, is_active, owner_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {CLIENT_COLUMNS}"
        );
        let row: ClientRow = sqlx::query_as(&query)
            .bind(&client.client_id)
            .bind(&client.client_secret_hash)
            .bind(&client.client_name)
            .bind(&client.description)
            .bind(&client.client_uri)
            .bind(&client.logo_uri)
            .bind(&client.redirect_uris)
            .bind(&client.grant_types)
            .bind(&client.response_types)
            .bind(&client.scope)
            .bind(&client.tos_uri)
            .bind(&client.policy_uri)
            .bind(&client.contacts)
            .bind(client.is_confidential)
            .bind(client.is_active)
            .bind(client.owner_id)
            .bind(client.created_at)
            .bind(client.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, _ctx: &RequestContext, id: i64) -> Result<Option<Client>> {
        let query = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1");
        let row: Option<ClientRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_client_id(
        &self,
        _ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Option<Client>> {
        let query = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = $1");
        let row: Option<ClientRow> = sqlx::query_as(&query)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_owner(
        &self,
        _ctx: &RequestContext,
        owner_id: i64,
        page: PageQuery,
    ) -> Result<Page<Client>> {
        let page = page.normalized();

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let query = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE owner_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        let rows: Vec<ClientRow> = sqlx::query_as(&query)
            .bind(owner_id)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Page {
            items: rows.into_iter().map(Into::into).collect(),
            total: total as u64,
            page: page.page,
            per_page: page.limit,
        })
    }

    async fn update(&self, _ctx: &RequestContext, client: &Client) -> Result<()> {
        sqlx::query(
            "UPDATE clients SET client_name = $2, description = $3, client_uri = $4, \
             logo_uri = $5, redirect_uris = $6, grant_types = $7, response_types = $8, \
             scope = $9, tos_uri = $10, policy_uri = $11, contacts = $12, is_active = $13, \
             updated_at = $14 \
             WHERE id = $1",
        )
        .bind(client.id)
        .bind(&client.client_name)
        .bind(&client.description)
        .bind(&client.client_uri)
        .bind(&client.logo_uri)
        .bind(&client.redirect_uris)
        .bind(&client.grant_types)
        .bind(&client.response_types)
        .bind(&client.scope)
        .bind(&client.tos_uri)
        .bind(&client.policy_uri)
        .bind(&client.contacts)
        .bind(client.is_active)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
