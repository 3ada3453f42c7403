// User registry: registration, login, self-management, and the web
// session lifecycle operations exposed on the management API.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verigate_core::context::RequestContext;
use verigate_core::logger::Logger;
use verigate_core::model::User;
use verigate_core::store::{UserProfileUpdate, UserStore};
use verigate_core::AppError;

use crate::crypto::password;
use crate::services::session::WebSessionService;
use crate::services::token::OAuthTokenService;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            profile_picture_url: user.profile_picture_url.clone(),
            phone_number: user.phone_number.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    sessions: Arc<WebSessionService>,
    tokens: Arc<OAuthTokenService>,
    logger: Logger,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        sessions: Arc<WebSessionService>,
        tokens: Arc<OAuthTokenService>,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            sessions,
            tokens,
            logger,
        }
    }

    /// Create an account. Username and email are unique
    /// case-insensitively, each with its own error so the form can point
    /// at the right field.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        req: RegisterRequest,
    ) -> Result<UserResponse, AppError> {
        if req.username.is_empty() || req.email.is_empty() || req.password.is_empty() {
            return Err(AppError::bad_request("username, email and password are required"));
        }

        if self.store.find_by_email(ctx, &req.email).await?.is_some() {
            return Err(AppError::conflict("email already registered")
                .with_details(serde_json::json!({ "field": "email" })));
        }
        if self
            .store
            .find_by_username(ctx, &req.username)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("username already taken")
                .with_details(serde_json::json!({ "field": "username" })));
        }

        let now = Utc::now();
        let user = User {
            id: 0, // assigned by the store
            username: req.username,
            email: req.email.to_lowercase(),
            password_hash: password::hash_password(&req.password)?,
            full_name: req.full_name,
            profile_picture_url: None,
            phone_number: None,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let created = self.store.insert(ctx, &user).await?;
        Ok(UserResponse::from(&created))
    }

    /// Password login. Verification is constant-time; the `last_login_at`
    /// write is best-effort audit, never a login failure.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        req: LoginRequest,
    ) -> Result<LoginResponse, AppError> {
        let user = self
            .store
            .find_by_email(ctx, &req.email)
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

        if !password::verify_password(&user.password_hash, &req.password)? {
            return Err(AppError::unauthorized("invalid credentials"));
        }
        if !user.is_active {
            return Err(AppError::unauthorized("account is not active"));
        }

        if let Err(err) = self.store.update_last_login(ctx, user.id).await {
            self.logger
                .warn(&format!("last_login_at update failed for user {}: {err}", user.id));
        }

        let pair = self.sessions.create_pair(ctx, user.id).await?;
        Ok(LoginResponse {
            user: UserResponse::from(&user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.access_expires_at,
        })
    }

    pub async fn get(&self, ctx: &RequestContext, id: i64) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;
        Ok(UserResponse::from(&user))
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        req: UpdateUserRequest,
    ) -> Result<(), AppError> {
        if self.store.find_by_id(ctx, id).await?.is_none() {
            return Err(AppError::not_found("user not found"));
        }
        self.store
            .update_profile(
                ctx,
                id,
                &UserProfileUpdate {
                    full_name: req.full_name,
                    profile_picture_url: req.profile_picture_url,
                    phone_number: req.phone_number,
                },
            )
            .await
    }

    /// The old password must verify before the hash is replaced.
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        id: i64,
        req: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        if !password::verify_password(&user.password_hash, &req.old_password)? {
            return Err(AppError::unauthorized("incorrect password"));
        }

        let new_hash = password::hash_password(&req.new_password)?;
        self.store.update_password(ctx, id, &new_hash).await
    }

    /// Hard delete. Sessions and OAuth tokens are revoked first so
    /// nothing issued to the account outlives it.
    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> Result<(), AppError> {
        if self.store.find_by_id(ctx, id).await?.is_none() {
            return Err(AppError::not_found("user not found"));
        }

        self.sessions.revoke_all(ctx, id).await?;
        self.tokens.revoke_all_for_user(ctx, id).await?;
        self.store.delete(ctx, id).await
    }

    /// Rotate the web session pair.
    pub async fn refresh_token(
        &self,
        ctx: &RequestContext,
        req: RefreshTokenRequest,
    ) -> Result<RefreshTokenResponse, AppError> {
        let pair = self.sessions.refresh(ctx, &req.refresh_token).await?;
        Ok(RefreshTokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: pair.access_expires_at,
        })
    }

    /// Logout everywhere: revoke every web refresh token of the user.
    pub async fn logout(&self, ctx: &RequestContext, user_id: i64) -> Result<(), AppError> {
        self.sessions.revoke_all(ctx, user_id).await
    }
}
