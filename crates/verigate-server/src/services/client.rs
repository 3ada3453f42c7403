// Client registry: OAuth client CRUD, credential validation, and
// ownership checks.
//
// A fresh client_id (16 random bytes) is generated on create; a client
// secret (32 random bytes) only for confidential clients. The plaintext
// secret is returned exactly once; only its hash is stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verigate_core::context::RequestContext;
use verigate_core::logger::Logger;
use verigate_core::model::{Client, Page, PageQuery};
use verigate_core::store::ClientStore;
use verigate_core::AppError;
use verigate_oauth::scope;

use crate::crypto::{password, random};
use crate::services::token::OAuthTokenService;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub client_name: String,
    pub description: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub scope: String,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    pub is_confidential: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    pub scope: Option<String>,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    pub contacts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientResponse {
    pub id: i64,
    pub client_id: String,
    /// Present only in the create response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_name: String,
    pub description: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub scope: String,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    pub is_confidential: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientResponse {
    fn from_client(client: &Client, client_secret: Option<String>) -> Self {
        Self {
            id: client.id,
            client_id: client.client_id.clone(),
            client_secret,
            client_name: client.client_name.clone(),
            description: client.description.clone(),
            client_uri: client.client_uri.clone(),
            logo_uri: client.logo_uri.clone(),
            redirect_uris: client.redirect_uris.clone(),
            grant_types: client.grant_types.clone(),
            response_types: client.response_types.clone(),
            scope: client.scope.clone(),
            tos_uri: client.tos_uri.clone(),
            policy_uri: client.policy_uri.clone(),
            is_confidential: client.is_confidential,
            is_active: client.is_active,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn ClientStore>,
    tokens: Arc<OAuthTokenService>,
    logger: Logger,
}

impl ClientService {
    pub fn new(store: Arc<dyn ClientStore>, tokens: Arc<OAuthTokenService>, logger: Logger) -> Self {
        Self {
            store,
            tokens,
            logger,
        }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        owner_id: i64,
        req: CreateClientRequest,
    ) -> Result<ClientResponse, AppError> {
        if req.client_name.is_empty() {
            return Err(AppError::bad_request("client_name is required"));
        }
        if req.redirect_uris.is_empty() {
            return Err(AppError::bad_request("at least one redirect_uri is required"));
        }
        if !scope::is_well_formed(&req.scope) {
            return Err(AppError::bad_request("malformed scope string"));
        }

        let client_id = random::client_id();
        let (client_secret, client_secret_hash) = if req.is_confidential {
            let secret = random::client_secret();
            let hash = password::hash_password(&secret)?;
            (Some(secret), Some(hash))
        } else {
            (None, None)
        };

        let now = Utc::now();
        let client = Client {
            id: 0, // assigned by the store
            client_id,
            client_secret_hash,
            client_name: req.client_name,
            description: req.description,
            client_uri: req.client_uri,
            logo_uri: req.logo_uri,
            redirect_uris: req.redirect_uris,
            grant_types: if req.grant_types.is_empty() {
                vec!["authorization_code".into(), "refresh_token".into()]
            } else {
                req.grant_types
            },
            response_types: if req.response_types.is_empty() {
                vec!["code".into()]
            } else {
                req.response_types
            },
            scope: req.scope,
            tos_uri: req.tos_uri,
            policy_uri: req.policy_uri,
            contacts: req.contacts,
            is_confidential: req.is_confidential,
            is_active: true,
            owner_id,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert(ctx, &client).await?;
        // The one time the plaintext secret leaves the server.
        Ok(ClientResponse::from_client(&created, client_secret))
    }

    pub async fn get(&self, ctx: &RequestContext, id: i64) -> Result<ClientResponse, AppError> {
        let client = self
            .store
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::not_found("client not found"))?;
        Ok(ClientResponse::from_client(&client, None))
    }

    /// Lookup by the public wire identifier, for the protocol paths.
    pub async fn get_by_client_id(
        &self,
        ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Option<Client>, AppError> {
        self.store.find_by_client_id(ctx, client_id).await
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        owner_id: i64,
        page: PageQuery,
    ) -> Result<Page<ClientResponse>, AppError> {
        let clients = self.store.find_by_owner(ctx, owner_id, page).await?;
        Ok(Page {
            items: clients
                .items
                .iter()
                .map(|c| ClientResponse::from_client(c, None))
                .collect(),
            total: clients.total,
            page: clients.page,
            per_page: clients.per_page,
        })
    }

    /// Update, owner-only. A non-owner gets Forbidden, distinct from the
    /// NotFound of a missing client.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        owner_id: i64,
        req: UpdateClientRequest,
    ) -> Result<(), AppError> {
        let mut client = self
            .store
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::not_found("client not found"))?;
        if client.owner_id != owner_id {
            return Err(AppError::forbidden("not authorized to update this client"));
        }

        if let Some(redirect_uris) = &req.redirect_uris {
            if redirect_uris.is_empty() {
                return Err(AppError::bad_request("at least one redirect_uri is required"));
            }
        }
        if let Some(scope_str) = &req.scope {
            if !scope::is_well_formed(scope_str) {
                return Err(AppError::bad_request("malformed scope string"));
            }
        }

        if let Some(v) = req.client_name {
            client.client_name = v;
        }
        if let Some(v) = req.description {
            client.description = Some(v);
        }
        if let Some(v) = req.client_uri {
            client.client_uri = Some(v);
        }
        if let Some(v) = req.logo_uri {
            client.logo_uri = Some(v);
        }
        if let Some(v) = req.redirect_uris {
            client.redirect_uris = v;
        }
        if let Some(v) = req.grant_types {
            client.grant_types = v;
        }
        if let Some(v) = req.response_types {
            client.response_types = v;
        }
        if let Some(v) = req.scope {
            client.scope = v;
        }
        if let Some(v) = req.tos_uri {
            client.tos_uri = Some(v);
        }
        if let Some(v) = req.policy_uri {
            client.policy_uri = Some(v);
        }
        if let Some(v) = req.contacts {
            client.contacts = v;
        }
        client.updated_at = Utc::now();

        self.store.update(ctx, &client).await
    }

    /// Delete, owner-only. Tokens issued to the client are revoked so the
    /// deletion cascades semantically; the revocation is best-effort once
    /// ownership is established.
    pub async fn delete(&self, ctx: &RequestContext, id: i64, owner_id: i64) -> Result<(), AppError> {
        let client = self
            .store
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::not_found("client not found"))?;
        if client.owner_id != owner_id {
            return Err(AppError::forbidden("not authorized to delete this client"));
        }

        if let Err(err) = self.tokens.revoke_all_for_client(ctx, &client.client_id).await {
            self.logger.warn(&format!(
                "token revocation on client {} deletion failed: {err}",
                client.client_id
            ));
        }
        self.store.delete(ctx, id).await
    }

    /// Credential validation for the token endpoint.
    ///
    /// Confidential clients must present their secret; public clients
    /// pass only with an empty one. A missing or inactive client and a
    /// bad secret are indistinguishable to the caller.
    pub async fn validate(
        &self,
        ctx: &RequestContext,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<Client, AppError> {
        let client = self
            .store
            .find_by_client_id(ctx, client_id)
            .await?
            .ok_or_else(|| AppError::invalid_client("invalid client credentials"))?;

        if !client.is_active {
            return Err(AppError::invalid_client("invalid client credentials"));
        }

        let secret = client_secret.unwrap_or("");
        if client.is_confidential {
            let hash = client
                .client_secret_hash
                .as_deref()
                .ok_or_else(|| AppError::invalid_client("invalid client credentials"))?;
            if secret.is_empty() || !password::verify_password(hash, secret)? {
                return Err(AppError::invalid_client("invalid client credentials"));
            }
        } else if !secret.is_empty() {
            // A public client has no secret; presenting one is a
            // misconfigured or impersonating caller.
            return Err(AppError::invalid_client("invalid client credentials"));
        }

        Ok(client)
    }
}
