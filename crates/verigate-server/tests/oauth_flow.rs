// End-to-end authorization-code and refresh flows over the full router.

mod common;

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, StatusCode};
use common::{
    authorize_uri, create_client, form_request, json_request, obtain_code, query_param,
    register_and_login, send, test_app, PKCE_CHALLENGE, PKCE_VERIFIER, REDIRECT_URI,
};

#[tokio::test]
async fn happy_path_code_flow_with_s256() {
    let app = test_app();
    let (user_id, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile email").await;
    let secret = secret.unwrap();

    // No prior consent: authorize must bounce to the consent UI with
    // every parameter preserved.
    let uri = authorize_uri(&client_id, "profile", "xyz", Some((PKCE_CHALLENGE, "S256")));
    let response = send(
        &app,
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
    assert!(location.starts_with("/api/v1/oauth/consent?"), "{location}");
    assert_eq!(query_param(&location, "state").as_deref(), Some("xyz"));
    assert_eq!(
        query_param(&location, "code_challenge").as_deref(),
        Some(PKCE_CHALLENGE)
    );

    // Approve and exchange.
    let code = obtain_code(&app, &session, &client_id, "profile", Some((PKCE_CHALLENGE, "S256")))
        .await;
    let token = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", PKCE_VERIFIER),
        ],
    )
    .await;
    assert_eq!(token.status, StatusCode::OK, "{:?}", token.json());
    let body = token.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 900);
    assert_eq!(body["scope"], "profile");
    assert!(body["refresh_token"].as_str().is_some());

    // The access token works against the UserInfo endpoint.
    let access_token = body["access_token"].as_str().unwrap();
    let userinfo = json_request(
        &app,
        "GET",
        "/api/v1/oauth/userinfo",
        Some(access_token),
        None,
    )
    .await;
    assert_eq!(userinfo.status, StatusCode::OK);
    assert_eq!(userinfo.json()["sub"], user_id.to_string());
    assert_eq!(userinfo.json()["preferred_username"], "alice");
}

#[tokio::test]
async fn code_replay_fails_and_revokes_issued_tokens() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();

    let code = obtain_code(&app, &session, &client_id, "profile", None).await;
    let fields = [
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
    ];

    let first = form_request(&app, "/api/v1/oauth/token", Some((&client_id, &secret)), &fields)
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let access_token = first.json()["access_token"].as_str().unwrap().to_string();

    // Same code again: invalid_grant, and the first exchange's tokens
    // are burned.
    let replay = form_request(&app, "/api/v1/oauth/token", Some((&client_id, &secret)), &fields)
        .await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.json()["error"], "invalid_grant");

    let userinfo = json_request(
        &app,
        "GET",
        "/api/v1/oauth/userinfo",
        Some(&access_token),
        None,
    )
    .await;
    assert_eq!(userinfo.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pkce_mismatch_burns_the_code() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();

    let code = obtain_code(&app, &session, &client_id, "profile", Some((PKCE_CHALLENGE, "S256")))
        .await;

    let bad = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", "wrong"),
        ],
    )
    .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.json()["error"], "invalid_grant");

    // The consume ran before the PKCE check, so even the right verifier
    // cannot redeem the code now.
    let retry = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", PKCE_VERIFIER),
        ],
    )
    .await;
    assert_eq!(retry.status, StatusCode::BAD_REQUEST);
    assert_eq!(retry.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn refresh_rotation_and_reuse_detection() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();

    let code = obtain_code(&app, &session, &client_id, "profile", None).await;
    let first = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
    )
    .await;
    assert_eq!(first.status, StatusCode::OK);
    let rt1 = first.json()["refresh_token"].as_str().unwrap().to_string();

    // Rotate.
    let second = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[("grant_type", "refresh_token"), ("refresh_token", &rt1)],
    )
    .await;
    assert_eq!(second.status, StatusCode::OK, "{:?}", second.json());
    let at2 = second.json()["access_token"].as_str().unwrap().to_string();
    let rt2 = second.json()["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(rt1, rt2);

    // The rotated-away token is dead.
    let reuse = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[("grant_type", "refresh_token"), ("refresh_token", &rt1)],
    )
    .await;
    assert_eq!(reuse.status, StatusCode::BAD_REQUEST);
    assert_eq!(reuse.json()["error"], "invalid_grant");

    // The fresh pair is unaffected.
    let userinfo = json_request(&app, "GET", "/api/v1/oauth/userinfo", Some(&at2), None).await;
    assert_eq!(userinfo.status, StatusCode::OK);

    let third = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[("grant_type", "refresh_token"), ("refresh_token", &rt2)],
    )
    .await;
    assert_eq!(third.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_scope_narrows_but_never_escalates() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile email").await;
    let secret = secret.unwrap();

    let code = obtain_code(&app, &session, &client_id, "profile email", None).await;
    let first = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
    )
    .await;
    assert_eq!(first.json()["scope"], "profile email");
    let rt = first.json()["refresh_token"].as_str().unwrap().to_string();

    // Narrowing is allowed; the new token carries exactly the narrowed
    // scope.
    let narrowed = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", &rt),
            ("scope", "profile"),
        ],
    )
    .await;
    assert_eq!(narrowed.status, StatusCode::OK);
    assert_eq!(narrowed.json()["scope"], "profile");
    let narrowed_rt = narrowed.json()["refresh_token"].as_str().unwrap().to_string();

    // Widening back is escalation and must fail.
    let escalated = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", &narrowed_rt),
            ("scope", "profile email admin"),
        ],
    )
    .await;
    assert_eq!(escalated.status, StatusCode::BAD_REQUEST);
    assert_eq!(escalated.json()["error"], "invalid_scope");
}

#[tokio::test]
async fn redirect_uri_must_match_byte_for_byte() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();

    let code = obtain_code(&app, &session, &client_id, "profile", None).await;

    // Trailing slash is a different URI.
    let tampered = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", "https://app.test/cb/"),
        ],
    )
    .await;
    assert_eq!(tampered.status, StatusCode::BAD_REQUEST);
    assert_eq!(tampered.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn client_authentication_rules() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, confidential_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();
    let (_, public_id, no_secret) = create_client(&app, &session, false, "profile").await;
    assert!(no_secret.is_none());

    // Wrong secret never obtains a token.
    let code = obtain_code(&app, &session, &confidential_id, "profile", None).await;
    let wrong = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&confidential_id, "not-the-secret")),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json()["error"], "invalid_client");

    // Confidential client with no credentials at all.
    let missing = form_request(
        &app,
        "/api/v1/oauth/token",
        None,
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", &confidential_id),
        ],
    )
    .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    // The untouched code still works with proper credentials.
    let good = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&confidential_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
    )
    .await;
    assert_eq!(good.status, StatusCode::OK, "{:?}", good.json());

    // Public client: no secret succeeds, any non-empty secret fails.
    let public_code = obtain_code(&app, &session, &public_id, "profile", None).await;
    let with_secret = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&public_id, "anything")),
        &[
            ("grant_type", "authorization_code"),
            ("code", &public_code),
            ("redirect_uri", REDIRECT_URI),
        ],
    )
    .await;
    assert_eq!(with_secret.status, StatusCode::UNAUTHORIZED);
    assert_eq!(with_secret.json()["error"], "invalid_client");

    let bare = form_request(
        &app,
        "/api/v1/oauth/token",
        None,
        &[
            ("grant_type", "authorization_code"),
            ("code", &public_code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", &public_id),
        ],
    )
    .await;
    assert_eq!(bare.status, StatusCode::OK, "{:?}", bare.json());
}

#[tokio::test]
async fn authorize_validation_errors() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, _) = create_client(&app, &session, true, "profile").await;

    // Unregistered redirect_uri: JSON error, never a redirect.
    let mut bad_redirect = url::form_urlencoded::Serializer::new(String::new());
    bad_redirect
        .append_pair("response_type", "code")
        .append_pair("client_id", &client_id)
        .append_pair("redirect_uri", "https://evil.test/cb")
        .append_pair("scope", "profile");
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri(format!("/api/v1/oauth/authorize?{}", bad_redirect.finish()))
            .header(AUTHORIZATION, format!("Bearer {session}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_request");

    // Scope outside the client's superset: error rides the redirect.
    let uri = authorize_uri(&client_id, "profile email", "s1", None);
    let response = send(
        &app,
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
    assert!(location.starts_with(REDIRECT_URI));
    assert_eq!(query_param(&location, "error").as_deref(), Some("invalid_scope"));
    assert_eq!(query_param(&location, "state").as_deref(), Some("s1"));

    // Only the code flow is supported.
    let mut implicit = url::form_urlencoded::Serializer::new(String::new());
    implicit
        .append_pair("response_type", "token")
        .append_pair("client_id", &client_id)
        .append_pair("redirect_uri", REDIRECT_URI);
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri(format!("/api/v1/oauth/authorize?{}", implicit.finish()))
            .header(AUTHORIZATION, format!("Bearer {session}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        query_param(&response.location(), "error").as_deref(),
        Some("unsupported_response_type")
    );

    // Unknown PKCE method.
    let uri = authorize_uri(&client_id, "profile", "s2", Some((PKCE_CHALLENGE, "S512")));
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri(&uri)
            .header(AUTHORIZATION, format!("Bearer {session}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        query_param(&response.location(), "error").as_deref(),
        Some("invalid_request")
    );

    // No session at all.
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri(authorize_uri(&client_id, "profile", "s3", None))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn consent_is_skipped_when_stored_scope_covers_request() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, _) = create_client(&app, &session, true, "profile email").await;

    // First pass stores consent for "profile email".
    obtain_code(&app, &session, &client_id, "profile email", None).await;

    // A narrower request goes straight to the code redirect.
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri(authorize_uri(&client_id, "profile", "s", None))
            .header(AUTHORIZATION, format!("Bearer {session}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::FOUND);
    let location = response.location();
    assert!(location.starts_with(REDIRECT_URI), "{location}");
    assert!(query_param(&location, "code").is_some());

    // Consent denial redirects with access_denied.
    let deny_uri = format!(
        "/api/v1/oauth/consent?redirect_uri={}&state=d1",
        url::form_urlencoded::byte_serialize(REDIRECT_URI.as_bytes()).collect::<String>()
    );
    let denied = json_request(
        &app,
        "POST",
        &deny_uri,
        Some(&session),
        Some(serde_json::json!({
            "client_id": client_id,
            "scope": "profile",
            "consent": false,
        })),
    )
    .await;
    assert_eq!(denied.status, StatusCode::OK);
    let redirect = denied.json()["redirect"].as_str().unwrap().to_string();
    assert_eq!(query_param(&redirect, "error").as_deref(), Some("access_denied"));
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("d1"));
}

#[tokio::test]
async fn revocation_endpoint_follows_rfc_7009() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();

    let code = obtain_code(&app, &session, &client_id, "profile", None).await;
    let token = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[
            ("grant_type", "authorization_code"),
            ("code", &code),
            ("redirect_uri", REDIRECT_URI),
        ],
    )
    .await;
    let access_token = token.json()["access_token"].as_str().unwrap().to_string();
    let refresh_token = token.json()["refresh_token"].as_str().unwrap().to_string();

    // Revoke the access token; validation must start failing.
    let revoked = form_request(
        &app,
        "/api/v1/oauth/revoke",
        Some((&client_id, &secret)),
        &[("token", &access_token), ("token_type_hint", "access_token")],
    )
    .await;
    assert_eq!(revoked.status, StatusCode::OK);

    let userinfo =
        json_request(&app, "GET", "/api/v1/oauth/userinfo", Some(&access_token), None).await;
    assert_eq!(userinfo.status, StatusCode::UNAUTHORIZED);

    // Revoking the refresh token kills the refresh grant.
    let revoked = form_request(
        &app,
        "/api/v1/oauth/revoke",
        Some((&client_id, &secret)),
        &[("token", &refresh_token)],
    )
    .await;
    assert_eq!(revoked.status, StatusCode::OK);

    let refresh = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret)),
        &[("grant_type", "refresh_token"), ("refresh_token", &refresh_token)],
    )
    .await;
    assert_eq!(refresh.status, StatusCode::BAD_REQUEST);

    // Unknown tokens and repeat revocations still answer 200.
    let unknown = form_request(
        &app,
        "/api/v1/oauth/revoke",
        Some((&client_id, &secret)),
        &[("token", "completely-unknown")],
    )
    .await;
    assert_eq!(unknown.status, StatusCode::OK);

    let again = form_request(
        &app,
        "/api/v1/oauth/revoke",
        Some((&client_id, &secret)),
        &[("token", &refresh_token)],
    )
    .await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn unsupported_grant_type_is_rejected() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;

    let response = form_request(
        &app,
        "/api/v1/oauth/token",
        Some((&client_id, &secret.unwrap())),
        &[("grant_type", "client_credentials")],
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "unsupported_grant_type");
}
