//! HTTP boundary: the axum router, authentication extractors, and the
//! per-realm error rendering.

pub mod clients;
pub mod error;
pub mod extract;
pub mod health;
pub mod oauth;
pub mod tokens;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// The full API surface under `/api/v1`, plus the liveness probe.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(oauth::routes())
        .merge(users::routes())
        .merge(clients::routes())
        .merge(tokens::routes())
        .merge(health::routes());

    Router::new().nest("/api/v1", api).with_state(state)
}
