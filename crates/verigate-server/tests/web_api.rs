// Management API: accounts, web sessions, client CRUD, token listing.

mod common;

use axum::http::StatusCode;
use common::{
    create_client, form_request, json_request, obtain_code, register_and_login, test_app,
    REDIRECT_URI,
};

#[tokio::test]
async fn register_enforces_distinct_uniqueness_errors() {
    let app = test_app();
    register_and_login(&app, "alice", "alice@example.com").await;

    // Same email, different username.
    let email_taken = json_request(
        &app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(serde_json::json!({
            "username": "alice2",
            "email": "ALICE@example.com",
            "password": "pw-pw-pw-pw",
        })),
    )
    .await;
    assert_eq!(email_taken.status, StatusCode::CONFLICT);
    assert_eq!(email_taken.json()["error"]["details"]["field"], "email");

    // Same username, different email.
    let username_taken = json_request(
        &app,
        "POST",
        "/api/v1/users/register",
        None,
        Some(serde_json::json!({
            "username": "Alice",
            "email": "other@example.com",
            "password": "pw-pw-pw-pw",
        })),
    )
    .await;
    assert_eq!(username_taken.status, StatusCode::CONFLICT);
    assert_eq!(username_taken.json()["error"]["details"]["field"], "username");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = test_app();
    register_and_login(&app, "alice", "alice@example.com").await;

    let wrong_password = json_request(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(serde_json::json!({
            "email": "alice@example.com",
            "password": "nope",
        })),
    )
    .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);

    let unknown_user = json_request(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(serde_json::json!({
            "email": "ghost@example.com",
            "password": "whatever",
        })),
    )
    .await;
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_refresh_rotates_and_detects_reuse() {
    let app = test_app();
    let (_, _, rt1) = register_and_login(&app, "alice", "alice@example.com").await;

    // Rotate.
    let second = json_request(
        &app,
        "POST",
        "/api/v1/users/refresh-token",
        None,
        Some(serde_json::json!({ "refresh_token": rt1 })),
    )
    .await;
    assert_eq!(second.status, StatusCode::OK);
    let rt2 = second.json()["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(rt1, rt2);

    // Presenting the rotated-away token is reuse: it fails, and the
    // family kill takes the fresh token down with it.
    let reuse = json_request(
        &app,
        "POST",
        "/api/v1/users/refresh-token",
        None,
        Some(serde_json::json!({ "refresh_token": rt1 })),
    )
    .await;
    assert_eq!(reuse.status, StatusCode::UNAUTHORIZED);

    let after_kill = json_request(
        &app,
        "POST",
        "/api/v1/users/refresh-token",
        None,
        Some(serde_json::json!({ "refresh_token": rt2 })),
    )
    .await;
    assert_eq!(after_kill.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_kills_every_session() {
    let app = test_app();
    let (_, access, refresh) = register_and_login(&app, "alice", "alice@example.com").await;

    let logout = json_request(&app, "POST", "/api/v1/users/logout", Some(&access), None).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let refresh_after = json_request(
        &app,
        "POST",
        "/api/v1/users/refresh-token",
        None,
        Some(serde_json::json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(refresh_after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_management_round_trip() {
    let app = test_app();
    let (_, access, _) = register_and_login(&app, "alice", "alice@example.com").await;

    let me = json_request(&app, "GET", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["username"], "alice");
    assert!(me.json().get("password_hash").is_none());

    let updated = json_request(
        &app,
        "PUT",
        "/api/v1/users/me",
        Some(&access),
        Some(serde_json::json!({ "full_name": "Alice Example" })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["full_name"], "Alice Example");

    // Password change requires the old password.
    let wrong_old = json_request(
        &app,
        "PUT",
        "/api/v1/users/me/password",
        Some(&access),
        Some(serde_json::json!({
            "old_password": "incorrect",
            "new_password": "brand new password",
        })),
    )
    .await;
    assert_eq!(wrong_old.status, StatusCode::UNAUTHORIZED);

    let changed = json_request(
        &app,
        "PUT",
        "/api/v1/users/me/password",
        Some(&access),
        Some(serde_json::json!({
            "old_password": "correct horse battery staple",
            "new_password": "brand new password",
        })),
    )
    .await;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    let relogin = json_request(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(serde_json::json!({
            "email": "alice@example.com",
            "password": "brand new password",
        })),
    )
    .await;
    assert_eq!(relogin.status, StatusCode::OK);
}

#[tokio::test]
async fn account_deletion_revokes_sessions() {
    let app = test_app();
    let (_, access, refresh) = register_and_login(&app, "alice", "alice@example.com").await;

    let deleted = json_request(&app, "DELETE", "/api/v1/users/me", Some(&access), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let refresh_after = json_request(
        &app,
        "POST",
        "/api/v1/users/refresh-token",
        None,
        Some(serde_json::json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(refresh_after.status, StatusCode::UNAUTHORIZED);

    let relogin = json_request(
        &app,
        "POST",
        "/api/v1/users/login",
        None,
        Some(serde_json::json!({
            "email": "alice@example.com",
            "password": "correct horse battery staple",
        })),
    )
    .await;
    assert_eq!(relogin.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_crud_enforces_ownership() {
    let app = test_app();
    let (_, alice, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, mallory, _) = register_and_login(&app, "mallory", "mallory@example.com").await;

    let (id, client_id, secret) = create_client(&app, &alice, true, "profile").await;
    assert!(secret.is_some());

    // The secret never reappears after creation.
    let fetched = json_request(
        &app,
        "GET",
        &format!("/api/v1/clients/{id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert!(fetched.json().get("client_secret").is_none());
    assert_eq!(fetched.json()["client_id"], client_id);

    // Non-owner updates are Forbidden, distinct from NotFound.
    let foreign_update = json_request(
        &app,
        "PUT",
        &format!("/api/v1/clients/{id}"),
        Some(&mallory),
        Some(serde_json::json!({ "client_name": "Hijacked" })),
    )
    .await;
    assert_eq!(foreign_update.status, StatusCode::FORBIDDEN);

    let missing_update = json_request(
        &app,
        "PUT",
        "/api/v1/clients/99999",
        Some(&mallory),
        Some(serde_json::json!({ "client_name": "Ghost" })),
    )
    .await;
    assert_eq!(missing_update.status, StatusCode::NOT_FOUND);

    let owner_update = json_request(
        &app,
        "PUT",
        &format!("/api/v1/clients/{id}"),
        Some(&alice),
        Some(serde_json::json!({ "client_name": "Renamed App" })),
    )
    .await;
    assert_eq!(owner_update.status, StatusCode::OK);
    assert_eq!(owner_update.json()["client_name"], "Renamed App");

    // Listing is scoped to the owner.
    let alice_list = json_request(&app, "GET", "/api/v1/clients", Some(&alice), None).await;
    assert_eq!(alice_list.json()["total"], 1);
    let mallory_list = json_request(&app, "GET", "/api/v1/clients", Some(&mallory), None).await;
    assert_eq!(mallory_list.json()["total"], 0);

    let foreign_delete = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/clients/{id}"),
        Some(&mallory),
        None,
    )
    .await;
    assert_eq!(foreign_delete.status, StatusCode::FORBIDDEN);

    let owner_delete = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/clients/{id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(owner_delete.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn client_deletion_revokes_issued_tokens() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (id, client_id, secret) = create_client(&app, &session, true, "profile").await;
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

    let deleted = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/clients/{id}"),
        Some(&session),
        None,
    )
    .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let userinfo =
        json_request(&app, "GET", "/api/v1/oauth/userinfo", Some(&access_token), None).await;
    assert_eq!(userinfo.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_listing_and_self_revocation() {
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

    let list = json_request(&app, "GET", "/api/v1/tokens", Some(&session), None).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.json()["total"], 1);
    let token_id = list.json()["items"][0]["token_id"].as_str().unwrap().to_string();
    assert_eq!(list.json()["items"][0]["is_revoked"], false);

    // Another user cannot revoke it.
    let (_, mallory, _) = register_and_login(&app, "mallory", "mallory@example.com").await;
    let foreign = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/tokens/{token_id}"),
        Some(&mallory),
        None,
    )
    .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let revoked = json_request(
        &app,
        "DELETE",
        &format!("/api/v1/tokens/{token_id}"),
        Some(&session),
        None,
    )
    .await;
    assert_eq!(revoked.status, StatusCode::NO_CONTENT);

    let userinfo =
        json_request(&app, "GET", "/api/v1/oauth/userinfo", Some(&access_token), None).await;
    assert_eq!(userinfo.status, StatusCode::UNAUTHORIZED);

    let gone = json_request(
        &app,
        "DELETE",
        "/api/v1/tokens/no-such-token",
        Some(&session),
        None,
    )
    .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_tokens_are_rejected_on_oauth_endpoints_and_vice_versa() {
    let app = test_app();
    let (_, session, _) = register_and_login(&app, "alice", "alice@example.com").await;
    let (_, client_id, secret) = create_client(&app, &session, true, "profile").await;
    let secret = secret.unwrap();

    // A web-session JWT is not an OAuth bearer token.
    let userinfo = json_request(&app, "GET", "/api/v1/oauth/userinfo", Some(&session), None).await;
    assert_eq!(userinfo.status, StatusCode::UNAUTHORIZED);

    // And an OAuth access token is not a web session.
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

    let me = json_request(&app, "GET", "/api/v1/users/me", Some(&access_token), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let app = test_app();
    let health = json_request(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["status"], "ok");
}
