//! Cookie-driven session interceptor.
//!
//! Runs once per request, in front of every route:
//!
//! 1. A valid `access_token` cookie authenticates the request as-is.
//! 2. Otherwise a valid `refresh_token` cookie mints a replacement access
//!    token, which authenticates the request and is written back as a new
//!    `access_token` cookie on the way out, unless the handler has already
//!    set or cleared that cookie itself.
//! 3. Otherwise the request continues anonymously.
//!
//! Token failures never produce an error response here. Handlers that need a
//! caller reject through the [`CurrentUser`](super::auth::CurrentUser) extractor.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::{header::AUTHORIZATION, HeaderValue};
use tower_cookies::Cookies;
use tracing::{debug, warn};

use crate::{
    models::{
        jwt::{IssuedToken, TokenType},
        user::Identity,
    },
    services::{
        cookie_service::{CookieService, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE},
        jwt_service::{JwtService, TokenError},
    },
    AppState,
};

/// Where a request ended up after the inbound phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AccessValid,
    AccessExpiredRefreshAttempted,
    RefreshFailed,
}

/// Per-request auth context carried from the inbound to the outbound phase.
#[derive(Debug, Clone)]
pub struct RequestAuth {
    pub state: SessionState,
    /// Token presented downstream as `Authorization: Bearer ...`.
    pub bearer: Option<String>,
    pub identity: Option<Identity>,
    /// Set only when a new access token was minted for this request.
    pub pending_rotation: Option<IssuedToken>,
    pub access_attempted: bool,
}

impl RequestAuth {
    fn anonymous(state: SessionState, access_attempted: bool) -> Self {
        Self {
            state,
            bearer: None,
            identity: None,
            pending_rotation: None,
            access_attempted,
        }
    }

    /// Decide the session state from the raw cookie values. Performs no I/O.
    pub fn resolve(jwt: &JwtService, access: Option<&str>, refresh: Option<&str>) -> Self {
        let mut access_attempted = false;

        if let Some(token) = access {
            access_attempted = true;
            match jwt.decode(token, TokenType::Access) {
                Ok(claims) => {
                    return Self {
                        state: SessionState::AccessValid,
                        bearer: Some(token.to_string()),
                        identity: Some(claims.identity()),
                        pending_rotation: None,
                        access_attempted,
                    };
                }
                Err(err) => debug!(error = %err, "access cookie rejected, trying refresh cookie"),
            }
        }

        let Some(refresh) = refresh else {
            return Self::anonymous(SessionState::Unauthenticated, access_attempted);
        };

        match jwt.refresh_access(refresh) {
            Ok(minted) => Self {
                state: SessionState::AccessExpiredRefreshAttempted,
                bearer: Some(minted.token.clone()),
                identity: Some(minted.claims.identity()),
                pending_rotation: Some(minted),
                access_attempted,
            },
            Err(TokenError::Encoding(reason)) => {
                warn!(%reason, "could not sign rotated access token");
                Self::anonymous(SessionState::RefreshFailed, access_attempted)
            }
            Err(err) => {
                debug!(error = %err, "refresh cookie rejected");
                Self::anonymous(SessionState::RefreshFailed, access_attempted)
            }
        }
    }
}

pub async fn jwt_cookie_interceptor(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let inbound_access = raw_cookie(&cookies, ACCESS_TOKEN_COOKIE);
    let access = CookieService::extract(&cookies, ACCESS_TOKEN_COOKIE);
    let refresh = CookieService::extract(&cookies, REFRESH_TOKEN_COOKIE);

    let auth = RequestAuth::resolve(&state.jwt, access.as_deref(), refresh.as_deref());
    debug!(
        state = ?auth.state,
        access_attempted = auth.access_attempted,
        user_id = auth.identity.as_ref().map(|identity| identity.id),
        "resolved session"
    );

    if let Some(bearer) = &auth.bearer {
        match HeaderValue::from_str(&format!("Bearer {bearer}")) {
            Ok(value) => {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "token is not a valid header value"),
        }
    }
    if let Some(identity) = &auth.identity {
        request.extensions_mut().insert(identity.clone());
    }

    let response = next.run(request).await;

    if let Some(minted) = &auth.pending_rotation {
        // sign-in, sign-up and sign-out write their own session cookies
        if raw_cookie(&cookies, ACCESS_TOKEN_COOKIE) != inbound_access {
            debug!("handler replaced the access cookie, skipping rotation");
        } else {
            debug!(expires_at = minted.expires_at(), "rotating access cookie");
            state.cookies.set_access_cookie(&cookies, minted);
        }
    }

    response
}

fn raw_cookie(cookies: &Cookies, name: &str) -> Option<String> {
    cookies.get(name).map(|cookie| cookie.value().to_string())
}
