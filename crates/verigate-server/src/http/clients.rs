// Client registration CRUD (session realm).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use verigate_core::model::PageQuery;

use crate::http::error::ApiError;
use crate::http::extract::SessionAuth;
use crate::services::client::{CreateClientRequest, UpdateClientRequest};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list).post(create))
        .route("/clients/:id", get(get_one).put(update).delete(delete_one))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<u32>,
    limit: Option<u32>,
}

impl PageParams {
    fn into_query(self) -> PageQuery {
        PageQuery::new(self.page.unwrap_or(1), self.limit.unwrap_or(20))
    }
}

/// POST /clients - the only response that carries the plaintext secret.
async fn create(
    auth: SessionAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateClientRequest>,
) -> Result<Response, ApiError> {
    let client = state.clients.create(&auth.ctx, auth.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(client)).into_response())
}

/// GET /clients: clients owned by the caller.
async fn list(
    auth: SessionAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    let page = state
        .clients
        .list(&auth.ctx, auth.user_id, params.into_query())
        .await?;
    Ok(Json(page).into_response())
}

/// GET /clients/:id
async fn get_one(
    auth: SessionAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let client = state.clients.get(&auth.ctx, id).await?;
    Ok(Json(client).into_response())
}

/// PUT /clients/:id: owner only.
async fn update(
    auth: SessionAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Response, ApiError> {
    state.clients.update(&auth.ctx, id, auth.user_id, req).await?;
    let client = state.clients.get(&auth.ctx, id).await?;
    Ok(Json(client).into_response())
}

/// DELETE /clients/:id: owner only; cascades token revocation.
async fn delete_one(
    auth: SessionAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.clients.delete(&auth.ctx, id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
