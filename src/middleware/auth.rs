use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use http::header::AUTHORIZATION;

use crate::{errors::AppError, models::jwt::TokenType, models::user::Identity, AppState};

/// The authenticated caller. Rejects with 401 when the request carries no
/// usable access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl CurrentUser {
    /// Owner-or-read-only: anyone may read, only the owner may change.
    pub fn ensure_owns(&self, owner: i64) -> Result<(), AppError> {
        if self.0.id == owner {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// The caller if there is one; never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

/// Resolve the caller of a request: the identity the cookie interceptor
/// attached, otherwise a bearer token presented directly by the client.
pub fn current_identity(parts: &Parts, state: &AppState) -> Option<Identity> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
        return Some(identity.clone());
    }

    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))?;

    state
        .jwt
        .decode(token.trim(), TokenType::Access)
        .ok()
        .map(|claims| claims.identity())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        current_identity(parts, state)
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(current_identity(parts, state)))
    }
}
