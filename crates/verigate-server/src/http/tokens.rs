// Token listing and revocation for the management API (session realm).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use verigate_core::model::PageQuery;

use crate::http::error::ApiError;
use crate::http::extract::SessionAuth;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", get(list))
        .route("/tokens/:id", axum::routing::delete(revoke))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<u32>,
    limit: Option<u32>,
}

/// GET /tokens - the caller's access tokens.
async fn list(
    auth: SessionAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let page = PageQuery::new(params.page.unwrap_or(1), params.limit.unwrap_or(20));
    let tokens = state
        .tokens
        .list_for_user(&auth.ctx, auth.user_id, page)
        .await?;
    Ok(Json(tokens).into_response())
}

/// DELETE /tokens/:id: revoke one of the caller's tokens.
async fn revoke(
    auth: SessionAuth,
    State(state): State<AppState>,
    Path(token_id): Path<String>,
) -> Result<Response, ApiError> {
    state
        .tokens
        .revoke_for_user(&auth.ctx, &token_id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
