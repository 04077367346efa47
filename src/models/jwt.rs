use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::Identity;

/// Distinguishes access from refresh credentials so one can't stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,           // user id
    pub username: String,
    pub email: String,
    pub token_type: TokenType,
    pub iat: i64,           // issued at
    pub exp: i64,           // expiration time
    pub jti: String,        // unique per token
}

impl Claims {
    pub fn new(identity: &Identity, token_type: TokenType, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            sub: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            token_type,
            iat: issued_at.timestamp(),
            exp: expiry(issued_at, lifetime),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Access claims for the same subject, taken from these refresh claims.
    pub fn derive_access(&self, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            sub: self.sub,
            username: self.username.clone(),
            email: self.email.clone(),
            token_type: TokenType::Access,
            iat: issued_at.timestamp(),
            exp: expiry(issued_at, lifetime),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Saturates instead of overflowing for lifetimes past the representable range.
fn expiry(issued_at: DateTime<Utc>, lifetime: Duration) -> i64 {
    issued_at
        .checked_add_signed(lifetime)
        .map_or(i64::MAX, |exp| exp.timestamp())
}

/// An encoded token together with the claims it was signed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

impl IssuedToken {
    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}
