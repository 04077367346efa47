use axum::{
    Router,
    body::Body,
    http::{header::SET_COOKIE, HeaderMap, Request, StatusCode},
};
use chrono::{Duration, Utc};
use cookie::Cookie;
use serde_json::{json, Value};
use std::sync::Once;
use tower::ServiceExt;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::{
    config::{AppConfig, TokenLifetimes},
    create_router, db,
    models::jwt::{Claims, TokenType},
    models::user::Identity,
    AppState,
};

pub const TEST_SECRET: &str = "router-test-secret";

static INIT: Once = Once::new();

/// Initialize logging exactly once
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::ERROR)
            .with_span_events(FmtSpan::NONE)
            .try_init();
    });
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        secret_key: TEST_SECRET.to_string(),
        lifetimes: TokenLifetimes::default(),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        secure_cookies: false,
        // lowest cost bcrypt accepts
        bcrypt_cost: 4,
    }
}

pub async fn create_test_app() -> (Router, AppState) {
    init_tracing();
    info!("Setting up test database");

    let config = test_config();
    let pool = db::create_db_pool(&config.database_url)
        .await
        .expect("Failed to create test database");

    let state = AppState::new(pool, &config).expect("Failed to build app state");
    (create_router(state.clone()), state)
}

pub async fn test_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: Option<HeaderMap>,
) -> (StatusCode, String, HeaderMap) {
    info!(method = %method, uri = %uri, "Making test request");

    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    // Add custom headers if provided
    if let Some(custom_headers) = headers {
        for (key, value) in custom_headers.iter() {
            request = request.header(key, value);
        }
    }

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = String::from_utf8(
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();

    info!(status = %status, body = %body, "Test response received");
    (status, body, headers)
}

/// A `cookie` request header carrying the given name/value pairs.
pub fn cookie_headers(cookies: &[(&str, &str)]) -> HeaderMap {
    let value = cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");

    let mut headers = HeaderMap::new();
    headers.insert("cookie", value.parse().unwrap());
    headers
}

pub fn response_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| Cookie::parse(value.to_string()).unwrap())
        .collect()
}

pub fn find_cookie<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a Cookie<'static>> {
    cookies.iter().find(|cookie| cookie.name() == name)
}

/// Sign up `username` and return the response body as JSON.
pub async fn signup(app: &Router, username: &str) -> Value {
    let (status, body, _) = test_request(
        app.clone(),
        "POST",
        "/api/signup",
        Some(json!({
            "username": username,
            "password": "password123",
            "email": format!("{username}@example.com"),
        })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    serde_json::from_str(&body).unwrap()
}

pub fn identity_of(state: &AppState, session: &Value) -> Identity {
    state
        .jwt
        .decode(session["refresh_token"].as_str().unwrap(), TokenType::Refresh)
        .unwrap()
        .identity()
}

/// An access token for `identity` whose signature is valid but whose expiry has passed.
pub fn expired_access_token(state: &AppState, identity: &Identity) -> (String, i64) {
    let claims = Claims::new(
        identity,
        TokenType::Access,
        Utc::now() - Duration::hours(1),
        Duration::minutes(15),
    );
    let exp = claims.exp;
    (state.jwt.encode(&claims).unwrap(), exp)
}

pub fn session_cookies(session: &Value) -> HeaderMap {
    cookie_headers(&[
        ("access_token", session["access_token"].as_str().unwrap()),
        ("refresh_token", session["refresh_token"].as_str().unwrap()),
    ])
}
