// User account and web-session endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use verigate_core::context::RequestContext;

use crate::http::error::ApiError;
use crate::http::extract::SessionAuth;
use crate::services::user::{
    ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, UpdateUserRequest,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh_token))
        .route("/users/logout", post(logout))
        .route("/users/me", get(me).put(update_me).delete(delete_me))
        .route("/users/me/password", put(change_password))
}

/// POST /users/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let ctx = RequestContext::anonymous();
    let user = state.users.register(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// POST /users/login
async fn login(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let ctx = RequestContext::anonymous().with_audit(
        headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string()),
    );
    let response = state.users.login(&ctx, req).await?;
    Ok(Json(response).into_response())
}

/// POST /users/refresh-token: rotate the session pair.
async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Response, ApiError> {
    let ctx = RequestContext::anonymous();
    let response = state.users.refresh_token(&ctx, req).await?;
    Ok(Json(response).into_response())
}

/// POST /users/logout: kill every session of the user.
async fn logout(auth: SessionAuth, State(state): State<AppState>) -> Result<Response, ApiError> {
    state.users.logout(&auth.ctx, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /users/me
async fn me(auth: SessionAuth, State(state): State<AppState>) -> Result<Response, ApiError> {
    let user = state.users.get(&auth.ctx, auth.user_id).await?;
    Ok(Json(user).into_response())
}

/// PUT /users/me
async fn update_me(
    auth: SessionAuth,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Response, ApiError> {
    state.users.update(&auth.ctx, auth.user_id, req).await?;
    let user = state.users.get(&auth.ctx, auth.user_id).await?;
    Ok(Json(user).into_response())
}

/// DELETE /users/me: hard delete plus token cascade.
async fn delete_me(auth: SessionAuth, State(state): State<AppState>) -> Result<Response, ApiError> {
    state.users.delete(&auth.ctx, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// PUT /users/me/password
async fn change_password(
    auth: SessionAuth,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .users
        .change_password(&auth.ctx, auth.user_id, req)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
