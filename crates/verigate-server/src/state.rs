// Application state: every store behind its contract, the shared
// signing keys, and the services wired on top. Built once at startup and
// cloned into request handlers.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use verigate_core::cache::Cache;
use verigate_core::logger::Logger;
use verigate_core::store::{
    AuthCodeStore, ClientStore, ConsentStore, OAuthTokenStore, ScopeStore, UserStore,
    WebSessionStore,
};
use verigate_core::AppError;

use crate::crypto::jwt::SigningKeys;
use crate::crypto::token_hash::TokenHasher;
use crate::services::{
    AuthorizationService, ClientService, OAuthTokenService, ScopeService, UserService,
    WebSessionService,
};

/// The full set of store implementations for one backend.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub clients: Arc<dyn ClientStore>,
    pub codes: Arc<dyn AuthCodeStore>,
    pub consents: Arc<dyn ConsentStore>,
    pub oauth_tokens: Arc<dyn OAuthTokenStore>,
    pub web_sessions: Arc<dyn WebSessionStore>,
    pub scopes: Arc<dyn ScopeStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub clients: Arc<ClientService>,
    pub scopes: Arc<ScopeService>,
    pub sessions: Arc<WebSessionService>,
    pub tokens: Arc<OAuthTokenService>,
    pub authorization: Arc<AuthorizationService>,
    pub logger: Logger,
}

impl AppState {
    /// Wire the services over a set of stores and a cache.
    pub fn new(
        stores: Stores,
        cache: Arc<dyn Cache>,
        keys: SigningKeys,
        token_hash_key: &str,
        access_ttl: StdDuration,
        refresh_ttl: StdDuration,
        logger: Logger,
    ) -> Result<Self, AppError> {
        let keys = Arc::new(keys);
        let hasher = TokenHasher::new(token_hash_key);
        let access_ttl = Duration::from_std(access_ttl)
            .map_err(|_| AppError::internal("access token TTL out of range"))?;
        let refresh_ttl = Duration::from_std(refresh_ttl)
            .map_err(|_| AppError::internal("refresh token TTL out of range"))?;

        let sessions = Arc::new(WebSessionService::new(
            stores.web_sessions,
            keys.clone(),
            hasher.clone(),
            access_ttl,
            refresh_ttl,
            logger.clone(),
        ));
        let tokens = Arc::new(OAuthTokenService::new(
            stores.oauth_tokens,
            cache,
            keys,
            hasher,
            access_ttl,
            refresh_ttl,
            logger.clone(),
        ));
        let scopes = Arc::new(ScopeService::new(stores.scopes));
        let clients = Arc::new(ClientService::new(
            stores.clients,
            tokens.clone(),
            logger.clone(),
        ));
        let users = Arc::new(UserService::new(
            stores.users.clone(),
            sessions.clone(),
            tokens.clone(),
            logger.clone(),
        ));
        let authorization = Arc::new(AuthorizationService::new(
            stores.codes,
            stores.consents,
            stores.users,
            clients.clone(),
            scopes.clone(),
            tokens.clone(),
            logger.clone(),
        ));

        Ok(Self {
            users,
            clients,
            scopes,
            sessions,
            tokens,
            authorization,
            logger,
        })
    }
}
