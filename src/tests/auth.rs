use std::time::Instant;

use axum::http::StatusCode;
use serde_json::{json, Value};

use super::helpers::{
    create_test_app, find_cookie, identity_of, init_tracing, response_cookies, session_cookies, signup,
    test_request,
};
use crate::db;
use crate::models::jwt::TokenType;
use crate::services::auth_service::AuthService;
use crate::services::cookie_service::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

#[tokio::test]
async fn test_signup_sets_cookies_matching_body() {
    let (app, state) = create_test_app().await;

    let (status, body, headers) = test_request(
        app,
        "POST",
        "/api/signup",
        Some(json!({
            "username": "alice",
            "password": "password123",
            "email": "alice@example.com"
        })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["username"], "alice");
    assert_eq!(response["email"], "alice@example.com");

    let cookies = response_cookies(&headers);
    assert_eq!(cookies.len(), 2);

    for (name, token_type) in [(ACCESS_TOKEN_COOKIE, TokenType::Access), (REFRESH_TOKEN_COOKIE, TokenType::Refresh)] {
        let cookie = find_cookie(&cookies, name).unwrap();
        assert_eq!(cookie.value(), response[name].as_str().unwrap());
        assert_eq!(cookie.http_only(), Some(true));

        let claims = state.jwt.decode(cookie.value(), token_type).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(
            cookie.expires_datetime().unwrap().unix_timestamp(),
            claims.exp
        );
    }
}

#[tokio::test]
async fn test_signup_duplicate_username() {
    let (app, _) = create_test_app().await;
    signup(&app, "alice").await;

    let (status, body, headers) = test_request(
        app,
        "POST",
        "/api/signup",
        Some(json!({ "username": "alice", "password": "another-password" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["detail"], "A user with that username already exists");
    assert!(response_cookies(&headers).is_empty());
}

#[tokio::test]
async fn test_signup_requires_username_and_password() {
    let (app, _) = create_test_app().await;

    let (status, _, _) = test_request(
        app,
        "POST",
        "/api/signup",
        Some(json!({ "username": "  ", "password": "" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signin_success() {
    let (app, state) = create_test_app().await;
    let session = signup(&app, "alice").await;

    let (status, body, headers) = test_request(
        app,
        "POST",
        "/api/signin",
        Some(json!({ "username": "alice", "password": "password123" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["username"], "alice");
    assert_eq!(response["email"], "alice@example.com");

    let cookies = response_cookies(&headers);
    assert_eq!(cookies.len(), 2);
    let access = find_cookie(&cookies, ACCESS_TOKEN_COOKIE).unwrap();
    assert_eq!(access.value(), response["access_token"].as_str().unwrap());

    let claims = state.jwt.decode(access.value(), TokenType::Access).unwrap();
    assert_eq!(claims.identity(), identity_of(&state, &session));
}

#[tokio::test]
async fn test_signin_failures_are_indistinguishable() {
    let (app, _) = create_test_app().await;
    signup(&app, "alice").await;

    let (wrong_status, wrong_body, wrong_headers) = test_request(
        app.clone(),
        "POST",
        "/api/signin",
        Some(json!({ "username": "alice", "password": "wrongpassword" })),
        None,
    )
    .await;

    let (unknown_status, unknown_body, _) = test_request(
        app,
        "POST",
        "/api/signin",
        Some(json!({ "username": "nobody", "password": "password123" })),
        None,
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert!(response_cookies(&wrong_headers).is_empty());
}

#[tokio::test]
async fn test_unknown_username_still_checks_a_password() {
    init_tracing();
    let pool = db::create_db_pool("sqlite::memory:").await.unwrap();
    let auth = AuthService::new(pool, 8).unwrap();
    auth.register("alice", "password123", "").await.unwrap();

    let started = Instant::now();
    for _ in 0..3 {
        assert!(auth.verify_credentials("alice", "wrongpassword").await.unwrap().is_none());
    }
    let known = started.elapsed();

    let started = Instant::now();
    for _ in 0..3 {
        assert!(auth.verify_credentials("nobody", "wrongpassword").await.unwrap().is_none());
    }
    let unknown = started.elapsed();

    // both paths pay for one bcrypt verification
    assert!(unknown * 3 > known, "unknown user took {unknown:?}, wrong password took {known:?}");
}

#[tokio::test]
async fn test_signout_requires_authentication() {
    let (app, _) = create_test_app().await;

    let (status, _, headers) = test_request(app, "POST", "/api/signout", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(response_cookies(&headers).is_empty());
}

#[tokio::test]
async fn test_signout_clears_both_cookies() {
    let (app, _) = create_test_app().await;
    let session = signup(&app, "alice").await;

    let (status, body, headers) =
        test_request(app, "POST", "/api/signout", None, Some(session_cookies(&session))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let cookies = response_cookies(&headers);
    assert_eq!(cookies.len(), 2);
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        let cookie = find_cookie(&cookies, name).unwrap();
        assert_eq!(cookie.value(), "");
        assert!(cookie.expires_datetime().unwrap() < time::OffsetDateTime::now_utc());
    }
}

#[tokio::test]
async fn test_signout_accepts_get() {
    let (app, _) = create_test_app().await;
    let session = signup(&app, "alice").await;

    let (status, _, _) =
        test_request(app, "GET", "/api/signout", None, Some(session_cookies(&session))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_tokens_outlive_signout() {
    let (app, _) = create_test_app().await;
    let session = signup(&app, "alice").await;

    let (status, _, _) = test_request(
        app.clone(),
        "POST",
        "/api/signout",
        None,
        Some(session_cookies(&session)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // no server-side revocation: a client replaying the old cookies is still let in
    let (status, body, _) =
        test_request(app, "GET", "/api/me", None, Some(session_cookies(&session))).await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["username"], "alice");
}

#[tokio::test]
async fn test_get_current_user() {
    let (app, state) = create_test_app().await;
    let session = signup(&app, "alice").await;

    let (status, body, _) =
        test_request(app, "GET", "/api/me", None, Some(session_cookies(&session))).await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["username"], "alice");
    assert_eq!(response["email"], "alice@example.com");
    assert_eq!(response["id"], identity_of(&state, &session).id);
}
