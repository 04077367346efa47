use std::sync::Arc;

use bcrypt::{hash, verify};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::user::{Identity, User};

/// User-management collaborator consumed by the session endpoints.
#[derive(Clone)]
pub struct AuthService {
    pool: SqlitePool,
    bcrypt_cost: u32,
    /// Verified against when the username is unknown, so both failure paths cost one bcrypt check.
    dummy_hash: Arc<str>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username already taken")]
    DuplicateUser,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

impl AuthService {
    pub fn new(pool: SqlitePool, bcrypt_cost: u32) -> Result<Self, AuthError> {
        let dummy_hash = hash("taskboard-dummy-password", bcrypt_cost)?;

        Ok(Self {
            pool,
            bcrypt_cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    #[instrument(skip(self, password, email))]
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<Identity, AuthError> {
        let password_hash = hash(password, self.bcrypt_cost)?;

        let user = User::create(&self.pool, username, email, &password_hash)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => AuthError::DuplicateUser,
                other => AuthError::Database(other),
            })?;

        info!(user_id = user.id, "registered user");
        Ok(Identity::from(&user))
    }

    /// `Ok(None)` for both an unknown username and a wrong password.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError> {
        let Some(user) = User::find_by_username(&self.pool, username).await? else {
            verify(password, &self.dummy_hash)?;
            warn!("sign-in attempt failed");
            return Ok(None);
        };

        if !verify(password, &user.password_hash)? {
            warn!("sign-in attempt failed");
            return Ok(None);
        }

        Ok(Some(Identity::from(&user)))
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        self.verify_credentials(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    pub async fn find_identity(&self, user_id: i64) -> Result<Option<Identity>, AuthError> {
        Ok(User::find_by_id(&self.pool, user_id)
            .await?
            .as_ref()
            .map(Identity::from))
    }
}
