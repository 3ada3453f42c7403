// OAuth protocol endpoints: authorize, token, revoke, userinfo, consent.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use verigate_oauth::redirect;
use verigate_oauth::types::{
    AuthorizeOutcome, AuthorizeRequest, ConsentDecision, RevokeRequest, TokenRequest,
};

use crate::http::error::{ApiError, ProtocolError};
use crate::http::extract::{client_credentials, BearerAuth, SessionAuth};
use crate::services::authorize::ConsentResumeParams;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/oauth/authorize", get(authorize))
        .route("/oauth/token", post(token))
        .route("/oauth/revoke", post(revoke))
        .route("/oauth/userinfo", get(userinfo))
        .route("/oauth/consent", get(consent_page).post(consent_decision))
}

/// 302 Found, the redirect status RFC 6749 uses for the front channel.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => ApiError(verigate_core::AppError::internal("invalid redirect target"))
            .into_response(),
    }
}

/// GET /oauth/authorize: start the code flow for a logged-in user.
async fn authorize(
    auth: SessionAuth,
    State(state): State<AppState>,
    Query(req): Query<AuthorizeRequest>,
) -> Response {
    match state.authorization.authorize(&auth.ctx, auth.user_id, &req).await {
        Ok(AuthorizeOutcome::CodeIssued { target, code }) => {
            match redirect::code_redirect(&target.redirect_uri, &code, target.state.as_deref()) {
                Some(url) => found(&url),
                None => ApiError(verigate_core::AppError::internal("failed to build redirect"))
                    .into_response(),
            }
        }
        Ok(AuthorizeOutcome::ConsentRequired { request }) => {
            let url = redirect::consent_url("/api/v1/oauth/consent", &request);
            found(&url)
        }
        Err(err) => match err.target {
            Some(target) => {
                match redirect::error_redirect(
                    &target.redirect_uri,
                    &err.error,
                    target.state.as_deref(),
                ) {
                    Some(url) => found(&url),
                    None => ProtocolError(err.error).into_response(),
                }
            }
            None => ProtocolError(err.error).into_response(),
        },
    }
}

/// POST /oauth/token: code exchange and refresh rotation.
async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(req): Form<TokenRequest>,
) -> Response {
    let credentials =
        match client_credentials(&headers, req.client_id.as_deref(), req.client_secret.as_deref()) {
            Ok(creds) => creds,
            Err(err) => {
                state.logger.debug(&format!("client authentication rejected: {err}"));
                return ProtocolError(verigate_oauth::OAuthError::invalid_client()).into_response();
            }
        };

    let ctx = verigate_core::context::RequestContext::oauth_client(credentials.client_id.clone());
    match state.authorization.token(&ctx, &req, &credentials).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => ProtocolError(err).into_response(),
    }
}

/// POST /oauth/revoke: RFC 7009. Success regardless of token state.
async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(req): Form<RevokeRequest>,
) -> Response {
    let credentials =
        match client_credentials(&headers, req.client_id.as_deref(), req.client_secret.as_deref()) {
            Ok(creds) => creds,
            Err(_) => {
                return ProtocolError(verigate_oauth::OAuthError::invalid_client()).into_response()
            }
        };

    let ctx = verigate_core::context::RequestContext::oauth_client(credentials.client_id.clone());
    match state.authorization.revoke(&ctx, &req, &credentials).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => ProtocolError(err).into_response(),
    }
}

/// GET /oauth/userinfo: OIDC UserInfo for the bearer's subject.
async fn userinfo(auth: BearerAuth, State(state): State<AppState>) -> Response {
    match state.authorization.userinfo(&auth.ctx, auth.user_id).await {
        Ok(info) => Json(info).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ConsentPageQuery {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    scope: String,
    state: Option<String>,
}

/// GET /oauth/consent: data for the consent UI.
async fn consent_page(
    auth: SessionAuth,
    State(state): State<AppState>,
    Query(query): Query<ConsentPageQuery>,
) -> Result<Response, ApiError> {
    let data = state
        .authorization
        .consent_page(&auth.ctx, &query.client_id, &query.scope, query.state)
        .await?;
    Ok(Json(data).into_response())
}

#[derive(Debug, Deserialize)]
struct ConsentResumeQuery {
    #[serde(default)]
    redirect_uri: String,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct ConsentRedirect {
    redirect: String,
}

/// POST /oauth/consent: apply the decision and resume the flow.
async fn consent_decision(
    auth: SessionAuth,
    State(state): State<AppState>,
    Query(query): Query<ConsentResumeQuery>,
    Json(decision): Json<ConsentDecision>,
) -> Result<Response, ApiError> {
    let resume = ConsentResumeParams {
        redirect_uri: query.redirect_uri,
        state: query.state,
        code_challenge: query.code_challenge,
        code_challenge_method: query.code_challenge_method,
    };
    let redirect = state
        .authorization
        .handle_consent(&auth.ctx, auth.user_id, &decision, &resume)
        .await?;
    Ok(Json(ConsentRedirect { redirect }).into_response())
}
