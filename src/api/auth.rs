use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use tracing::info;

use crate::{
    errors::AppError,
    middleware::auth::CurrentUser,
    models::{jwt::TokenPair, user::Identity},
    AppState,
};

#[derive(Deserialize)]
pub struct SignupRequest {
    username: String,
    password: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub username: String,
    pub email: String,
    pub refresh_token: String,
    pub access_token: String,
}

impl SessionResponse {
    fn new(identity: Identity, pair: &TokenPair) -> Self {
        Self {
            username: identity.username,
            email: identity.email,
            refresh_token: pair.refresh.token.clone(),
            access_token: pair.access.token.clone(),
        }
    }
}

/// Issue a token pair, set both cookies and echo the tokens in the body.
fn start_session(state: &AppState, cookies: &Cookies, identity: Identity) -> Result<SessionResponse, AppError> {
    let pair = state.jwt.issue_for_identity(&identity)?;
    state.cookies.set_auth_cookies(cookies, &pair);
    Ok(SessionResponse::new(identity, &pair))
}

pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest("Username and password are required"));
    }

    let identity = state
        .auth
        .register(username, &payload.password, payload.email.trim())
        .await?;

    info!(user_id = identity.id, "signed up");
    let body = start_session(&state, &cookies, identity)?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn signin(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let identity = state
        .auth
        .authenticate(&payload.username, &payload.password)
        .await?;

    info!(user_id = identity.id, "signed in");
    Ok(Json(start_session(&state, &cookies, identity)?))
}

/// Clears both cookies. The tokens themselves remain valid until they expire.
pub async fn signout(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    cookies: Cookies,
) -> StatusCode {
    state.cookies.clear_auth_cookies(&cookies);
    info!(user_id = identity.id, "signed out");
    StatusCode::NO_CONTENT
}
