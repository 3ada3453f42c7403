// Error rendering.
//
// Web endpoints surface `AppError` kinds directly; OAuth endpoints remap
// onto the protocol error body before anything leaves the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use verigate_core::AppError;
use verigate_oauth::error::OAuthError;
use verigate_oauth::types::ErrorResponse;

/// Wrapper so `AppError` can be returned straight from handlers.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "error": {
                "kind": self.0.kind.as_str(),
                "message": self.0.message,
                "details": self.0.details,
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Wrapper rendering the RFC 6749 error body.
#[derive(Debug)]
pub struct ProtocolError(pub OAuthError);

impl From<OAuthError> for ProtocolError {
    fn from(err: OAuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}
