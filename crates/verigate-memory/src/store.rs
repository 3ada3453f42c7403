// HashMap-backed store implementations.
//
// Each store wraps its maps in one `tokio::sync::RwLock`, so operations
// that must be atomic (the authorization-code compare-and-set, revoke
// flags) run under a single write lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use verigate_core::context::RequestContext;
use verigate_core::error::Result;
use verigate_core::model::{
    AuthorizationCode, Client, OAuthAccessToken, OAuthRefreshToken, Page, PageQuery, Scope, User,
    UserConsent, WebRefreshToken,
};
use verigate_core::store::{
    AuthCodeStore, ClientStore, ConsentStore, OAuthTokenStore, ScopeStore, UserProfileUpdate,
    UserStore, WebSessionStore,
};
use verigate_core::AppError;

fn paginate<T: Clone>(mut items: Vec<T>, page: PageQuery) -> Page<T> {
    let page = page.normalized();
    let total = items.len() as u64;
    let start = page.offset() as usize;
    let items = if start >= items.len() {
        Vec::new()
    } else {
        items.drain(start..).take(page.limit as usize).collect()
    };
    Page {
        items,
        total,
        page: page.page,
        per_page: page.limit,
    }
}

// ─── Users ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UserInner {
    users: HashMap<i64, User>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<RwLock<UserInner>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, _ctx: &RequestContext, user: &User) -> Result<User> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.users.values().any(|u| {
            u.username.eq_ignore_ascii_case(&user.username)
                || u.email.eq_ignore_ascii_case(&user.email)
        });
        if duplicate {
            return Err(AppError::conflict("username or email already exists"));
        }

        inner.next_id += 1;
        let mut created = user.clone();
        created.id = inner.next_id;
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, _ctx: &RequestContext, id: i64) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, _ctx: &RequestContext, username: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email(&self, _ctx: &RequestContext, email: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_profile(
        &self,
        _ctx: &RequestContext,
        id: i64,
        update: &UserProfileUpdate,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        if let Some(v) = &update.full_name {
            user.full_name = Some(v.clone());
        }
        if let Some(v) = &update.profile_picture_url {
            user.profile_picture_url = Some(v.clone());
        }
        if let Some(v) = &update.phone_number {
            user.phone_number = Some(v.clone());
        }
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_password(
        &self,
        _ctx: &RequestContext,
        id: i64,
        password_hash: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_login(&self, _ctx: &RequestContext, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        user.last_login_at = Some(Utc::now());
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, id: i64) -> Result<()> {
        self.inner.write().await.users.remove(&id);
        Ok(())
    }
}

// ─── Clients ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ClientInner {
    clients: HashMap<i64, Client>,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryClientStore {
    inner: Arc<RwLock<ClientInner>>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn insert(&self, _ctx: &RequestContext, client: &Client) -> Result<Client> {
        let mut inner = self.inner.write().await;
        if inner
            .clients
            .values()
            .any(|c| c.client_id == client.client_id)
        {
            return Err(AppError::conflict("client_id already exists"));
        }

        inner.next_id += 1;
        let mut created = client.clone();
        created.id = inner.next_id;
        inner.clients.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, _ctx: &RequestContext, id: i64) -> Result<Option<Client>> {
        Ok(self.inner.read().await.clients.get(&id).cloned())
    }

    async fn find_by_client_id(
        &self,
        _ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Option<Client>> {
        Ok(self
            .inner
            .read()
            .await
            .clients
            .values()
            .find(|c| c.client_id == client_id)
            .cloned())
    }

    async fn find_by_owner(
        &self,
        _ctx: &RequestContext,
        owner_id: i64,
        page: PageQuery,
    ) -> Result<Page<Client>> {
        let mut owned: Vec<Client> = self
            .inner
            .read()
            .await
            .clients
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|c| c.id);
        Ok(paginate(owned, page))
    }

    async fn update(&self, _ctx: &RequestContext, client: &Client) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(())
            }
            None => Err(AppError::not_found("client not found")),
        }
    }

    async fn delete(&self, _ctx: &RequestContext, id: i64) -> Result<()> {
        self.inner.write().await.clients.remove(&id);
        Ok(())
    }
}

// ─── Authorization codes ─────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthCodeStore {
    inner: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
}

impl InMemoryAuthCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthCodeStore for InMemoryAuthCodeStore {
    async fn insert(&self, _ctx: &RequestContext, code: &AuthorizationCode) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_by_code(
        &self,
        _ctx: &RequestContext,
        code: &str,
    ) -> Result<Option<AuthorizationCode>> {
        Ok(self.inner.read().await.get(code).cloned())
    }

    async fn consume(
        &self,
        _ctx: &RequestContext,
        code: &str,
    ) -> Result<Option<AuthorizationCode>> {
        // Check and flip under one write lock: the in-memory equivalent
        // of UPDATE … WHERE code = ? AND is_used = FALSE RETURNING.
        let mut inner = self.inner.write().await;
        match inner.get_mut(code) {
            Some(row) if !row.is_used => {
                row.is_used = true;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_expired(&self, _ctx: &RequestContext) -> Result<u64> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, code| code.expires_at > now);
        Ok((before - inner.len()) as u64)
    }
}

// ─── Consents ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryConsentStore {
    inner: Arc<RwLock<HashMap<(i64, String), UserConsent>>>,
}

impl InMemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn upsert(&self, _ctx: &RequestContext, consent: &UserConsent) -> Result<()> {
        let key = (consent.user_id, consent.client_id.clone());
        let mut inner = self.inner.write().await;
        match inner.get_mut(&key) {
            Some(existing) => {
                existing.scope = consent.scope.clone();
                existing.updated_at = consent.updated_at;
            }
            None => {
                inner.insert(key, consent.clone());
            }
        }
        Ok(())
    }

    async fn find(
        &self,
        _ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<Option<UserConsent>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&(user_id, client_id.to_string()))
            .cloned())
    }

    async fn delete(&self, _ctx: &RequestContext, user_id: i64, client_id: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .remove(&(user_id, client_id.to_string()));
        Ok(())
    }
}

// ─── OAuth tokens ────────────────────────────────────────────────

#[derive(Debug, Default)]
struct OAuthTokenInner {
    access: HashMap<String, OAuthAccessToken>,
    refresh: HashMap<String, OAuthRefreshToken>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOAuthTokenStore {
    inner: Arc<RwLock<OAuthTokenInner>>,
}

impl InMemoryOAuthTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OAuthTokenStore for InMemoryOAuthTokenStore {
    async fn insert_access(&self, _ctx: &RequestContext, token: &OAuthAccessToken) -> Result<()> {
        self.inner
            .write()
            .await
            .access
            .insert(token.token_id.clone(), token.clone());
        Ok(())
    }

    async fn insert_refresh(&self, _ctx: &RequestContext, token: &OAuthRefreshToken) -> Result<()> {
        self.inner
            .write()
            .await
            .refresh
            .insert(token.token_id.clone(), token.clone());
        Ok(())
    }

    async fn find_access_by_id(
        &self,
        _ctx: &RequestContext,
        token_id: &str,
    ) -> Result<Option<OAuthAccessToken>> {
        Ok(self.inner.read().await.access.get(token_id).cloned())
    }

    async fn find_refresh_by_hash(
        &self,
        _ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<OAuthRefreshToken>> {
        Ok(self
            .inner
            .read()
            .await
            .refresh
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn list_access_by_user(
        &self,
        _ctx: &RequestContext,
        user_id: i64,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>> {
        let mut tokens: Vec<OAuthAccessToken> = self
            .inner
            .read()
            .await
            .access
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(tokens, page))
    }

    async fn list_access_by_client(
        &self,
        _ctx: &RequestContext,
        client_id: &str,
        page: PageQuery,
    ) -> Result<Page<OAuthAccessToken>> {
        let mut tokens: Vec<OAuthAccessToken> = self
            .inner
            .read()
            .await
            .access
            .values()
            .filter(|t| t.client_id == client_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(tokens, page))
    }

    async fn revoke_access(&self, _ctx: &RequestContext, token_id: &str) -> Result<()> {
        if let Some(token) = self.inner.write().await.access.get_mut(token_id) {
            token.is_revoked = true;
        }
        Ok(())
    }

    async fn revoke_refresh(&self, _ctx: &RequestContext, token_id: &str) -> Result<()> {
        if let Some(token) = self.inner.write().await.refresh.get_mut(token_id) {
            token.is_revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, _ctx: &RequestContext, user_id: i64) -> Result<Vec<String>> {
        let mut inner = self.inner.write().await;
        let mut touched = Vec::new();
        for token in inner.access.values_mut().filter(|t| t.user_id == user_id) {
            token.is_revoked = true;
            touched.push(token.token_id.clone());
        }
        for token in inner.refresh.values_mut().filter(|t| t.user_id == user_id) {
            token.is_revoked = true;
        }
        Ok(touched)
    }

    async fn revoke_all_for_client(
        &self,
        _ctx: &RequestContext,
        client_id: &str,
    ) -> Result<Vec<String>> {
        let mut inner = self.inner.write().await;
        let mut touched = Vec::new();
        for token in inner
            .access
            .values_mut()
            .filter(|t| t.client_id == client_id)
        {
            token.is_revoked = true;
            touched.push(token.token_id.clone());
        }
        for token in inner
            .refresh
            .values_mut()
            .filter(|t| t.client_id == client_id)
        {
            token.is_revoked = true;
        }
        Ok(touched)
    }

    async fn revoke_all_for_user_client(
        &self,
        _ctx: &RequestContext,
        user_id: i64,
        client_id: &str,
    ) -> Result<Vec<String>> {
        let mut inner = self.inner.write().await;
        let mut touched = Vec::new();
        for token in inner
            .access
            .values_mut()
            .filter(|t| t.user_id == user_id && t.client_id == client_id)
        {
            token.is_revoked = true;
            touched.push(token.token_id.clone());
        }
        for token in inner
            .refresh
            .values_mut()
            .filter(|t| t.user_id == user_id && t.client_id == client_id)
        {
            token.is_revoked = true;
        }
        Ok(touched)
    }

    async fn revoke_refresh_by_access_id(
        &self,
        _ctx: &RequestContext,
        access_token_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        for token in inner
            .refresh
            .values_mut()
            .filter(|t| t.access_token_id.as_deref() == Some(access_token_id))
        {
            token.is_revoked = true;
        }
        Ok(())
    }

    async fn is_access_revoked(&self, _ctx: &RequestContext, token_id: &str) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .access
            .get(token_id)
            .map(|t| t.is_revoked)
            .unwrap_or(false))
    }
}

// ─── Web sessions ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebSessionStore {
    inner: Arc<RwLock<HashMap<String, WebRefreshToken>>>,
}

impl InMemoryWebSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebSessionStore for InMemoryWebSessionStore {
    async fn insert(&self, _ctx: &RequestContext, token: &WebRefreshToken) -> Result<()> {
        self.inner
            .write()
            .await
            .insert(token.token_id.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(
        &self,
        _ctx: &RequestContext,
        token_hash: &str,
    ) -> Result<Option<WebRefreshToken>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn revoke(&self, _ctx: &RequestContext, token_id: &str) -> Result<()> {
        if let Some(token) = self.inner.write().await.get_mut(token_id) {
            token.is_revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, _ctx: &RequestContext, user_id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        for token in inner.values_mut().filter(|t| t.user_id == user_id) {
            token.is_revoked = true;
        }
        Ok(())
    }
}

// ─── Scope catalog ───────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InMemoryScopeStore {
    inner: Arc<RwLock<HashMap<String, Scope>>>,
}

impl InMemoryScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the catalog.
    pub fn with_scopes(scopes: Vec<Scope>) -> Self {
        let map = scopes.into_iter().map(|s| (s.name.clone(), s)).collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl ScopeStore for InMemoryScopeStore {
    async fn find_by_name(&self, _ctx: &RequestContext, name: &str) -> Result<Option<Scope>> {
        Ok(self.inner.read().await.get(name).cloned())
    }

    async fn find_by_names(&self, _ctx: &RequestContext, names: &[String]) -> Result<Vec<Scope>> {
        let inner = self.inner.read().await;
        Ok(names.iter().filter_map(|n| inner.get(n).cloned()).collect())
    }

    async fn find_defaults(&self, _ctx: &RequestContext) -> Result<Vec<Scope>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|s| s.is_default)
            .cloned()
            .collect())
    }

    async fn find_all(&self, _ctx: &RequestContext) -> Result<Vec<Scope>> {
        Ok(self.inner.read().await.values().cloned().collect())
    }
}
