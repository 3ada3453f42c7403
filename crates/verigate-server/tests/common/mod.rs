// Shared harness for the HTTP-level integration tests.
//
// Builds the full router over the in-memory backend and drives it with
// tower::ServiceExt::oneshot, no TCP listener involved.
// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use tower::ServiceExt;
use verigate_core::logger::{Logger, LoggerConfig};
use verigate_core::model::Scope;
use verigate_memory::{
    InMemoryAuthCodeStore, InMemoryCache, InMemoryClientStore, InMemoryConsentStore,
    InMemoryOAuthTokenStore, InMemoryScopeStore, InMemoryUserStore, InMemoryWebSessionStore,
};
use verigate_server::crypto::jwt::SigningKeys;
use verigate_server::http;
use verigate_server::state::{AppState, Stores};

pub const TEST_PRIVATE_PEM: &str = include_str!("../../testdata/jwt_private.pem");
pub const TEST_PUBLIC_PEM: &str = include_str!("../../testdata/jwt_public.pem");

/// RFC 7636 appendix B vector.
pub const PKCE_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
pub const PKCE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

pub const REDIRECT_URI: &str = "https://app.test/cb";

pub fn test_app() -> Router {
    let stores = Stores {
        users: Arc::new(InMemoryUserStore::new()),
        clients: Arc::new(InMemoryClientStore::new()),
        codes: Arc::new(InMemoryAuthCodeStore::new()),
        consents: Arc::new(InMemoryConsentStore::new()),
        oauth_tokens: Arc::new(InMemoryOAuthTokenStore::new()),
        web_sessions: Arc::new(InMemoryWebSessionStore::new()),
        scopes: Arc::new(InMemoryScopeStore::with_scopes(vec![
            Scope {
                name: "profile".into(),
                description: "Read basic profile information".into(),
                is_default: true,
            },
            Scope {
                name: "email".into(),
                description: "Read the account email address".into(),
                is_default: false,
            },
        ])),
    };

    let keys = SigningKeys::from_pem(TEST_PRIVATE_PEM, TEST_PUBLIC_PEM).unwrap();
    let logger = Logger::new(LoggerConfig {
        disabled: true,
        ..Default::default()
    });
    let state = AppState::new(
        stores,
        Arc::new(InMemoryCache::new()),
        keys,
        "integration-test-token-hash-key",
        Duration::from_secs(900),
        Duration::from_secs(7 * 24 * 3600),
        logger,
    )
    .unwrap();

    http::router(state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }

    pub fn location(&self) -> String {
        self.headers
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let body = body.collect().await.unwrap().to_bytes().to_vec();
    TestResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    }
}

pub async fn json_request(
    app: &Router,
    method: &str,
    uri: &str,
    session: Option<&str>,
    body: Option<serde_json::Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = session {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

/// POST a form to the token or revoke endpoint with optional Basic auth.
pub async fn form_request(
    app: &Router,
    uri: &str,
    basic: Option<(&str, &str)>,
    fields: &[(&str, &str)],
) -> TestResponse {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    let body = serializer.finish();

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some((client_id, secret)) = basic {
        let encoded = STANDARD.encode(format!("{client_id}:{secret}"));
        builder = builder.header(AUTHORIZATION, format!("Basic {encoded}"));
    }
    send(app, builder.body(Body::from(body)).unwrap()).await
}

/// Register a user and log them in; returns (user_id, access, refresh).
pub async fn register_and_login(app: &Router, username: &str, email: &str) -> (i64, String, String) {
    let created = json_request(
        app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(serde_json::json!({
            "username": username,
            "email": email,
            "password": "correct horse battery staple",
        })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.json());
    let user_id = created.json()["id"].as_i64().unwrap();

    let login = json_request(
        app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(serde_json::json!({
            "email": email,
            "password": "correct horse battery staple",
        })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK, "{:?}", login.json());
    let body = login.json();
    (
        user_id,
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

/// Register an OAuth client owned by the session user. Returns
/// (numeric id, client_id, client_secret-if-confidential).
pub async fn create_client(
    app: &Router,
    session: &str,
    confidential: bool,
    scope: &str,
) -> (i64, String, Option<String>) {
    let response = json_request(
        app,
        "POST",
        "/api/v1/clients",
        Some(session),
        Some(serde_json::json!({
            "client_name": "Test App",
            "redirect_uris": [REDIRECT_URI],
            "scope": scope,
            "is_confidential": confidential,
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
    let body = response.json();
    (
        body["id"].as_i64().unwrap(),
        body["client_id"].as_str().unwrap().to_string(),
        body["client_secret"].as_str().map(String::from),
    )
}

/// Build an authorize URL with the given parameters.
pub fn authorize_uri(
    client_id: &str,
    scope: &str,
    state: &str,
    challenge: Option<(&str, &str)>,
) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("scope", scope)
        .append_pair("state", state);
    if let Some((challenge, method)) = challenge {
        serializer
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", method);
    }
    format!("/api/v1/oauth/authorize?{}", serializer.finish())
}

/// Pull a query parameter out of a URL string.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Run authorize + consent and return the issued code.
pub async fn obtain_code(
    app: &Router,
    session: &str,
    client_id: &str,
    scope: &str,
    challenge: Option<(&str, &str)>,
) -> String {
    let uri = authorize_uri(client_id, scope, "xyz", challenge);
    let response = send(
        app,
        Request::builder()
            .method("GET")
            .uri(&uri)
            .header(AUTHORIZATION, format!("Bearer {session}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::FOUND);
    let location = response.location();

    if location.starts_with(REDIRECT_URI) {
        // Prior consent covered the request; the code is already here.
        return query_param(&location, "code").unwrap();
    }

    // Bounced to the consent UI: approve and resume.
    assert!(location.starts_with("/api/v1/oauth/consent?"), "{location}");
    let consent_uri = format!(
        "/api/v1/oauth/consent?{}",
        location.split_once('?').unwrap().1
    );
    let decision = json_request(
        app,
        "POST",
        &consent_uri,
        Some(session),
        Some(serde_json::json!({
            "client_id": client_id,
            "scope": scope,
            "consent": true,
        })),
    )
    .await;
    assert_eq!(decision.status, StatusCode::OK, "{:?}", decision.json());
    let redirect = decision.json()["redirect"].as_str().unwrap().to_string();
    assert!(redirect.starts_with(REDIRECT_URI), "{redirect}");
    query_param(&redirect, "code").unwrap()
}
