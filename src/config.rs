use std::{env, net::SocketAddr, str::FromStr};

use chrono::{Duration, Utc};
use dotenv::dotenv;
use thiserror::Error;
use tracing::warn;

const DEFAULT_DATABASE_URL: &str = "sqlite:taskboard.db?mode=rwc";
const DEFAULT_ACCESS_MINUTES: i64 = 15;
const DEFAULT_REFRESH_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Lifetimes applied by the token issuer.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(DEFAULT_ACCESS_MINUTES),
            refresh: Duration::days(DEFAULT_REFRESH_DAYS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub secret_key: String,
    pub lifetimes: TokenLifetimes,
    pub bind_addr: SocketAddr,
    pub secure_cookies: bool,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file
        if dotenv().is_err() {
            warn!("no .env file found, using process environment only");
        }

        let secret_key = env::var("SECRET_KEY").map_err(|_| ConfigError::Missing("SECRET_KEY"))?;
        if secret_key.is_empty() {
            return Err(ConfigError::Missing("SECRET_KEY"));
        }

        let access_minutes = parse_var("ACCESS_TOKEN_LIFETIME_MINUTES", DEFAULT_ACCESS_MINUTES)?;
        let refresh_days = parse_var("REFRESH_TOKEN_LIFETIME_DAYS", DEFAULT_REFRESH_DAYS)?;
        let lifetimes = TokenLifetimes {
            access: lifetime("ACCESS_TOKEN_LIFETIME_MINUTES", access_minutes, Duration::try_minutes)?,
            refresh: lifetime("REFRESH_TOKEN_LIFETIME_DAYS", refresh_days, Duration::try_days)?,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            secret_key,
            lifetimes,
            bind_addr: parse_var("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            secure_cookies: parse_var("SECURE_COOKIES", false)?,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// A positive lifetime that still yields a representable expiry when added to now.
fn lifetime(
    name: &'static str,
    amount: i64,
    unit: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    unit(amount)
        .filter(|lifetime| *lifetime > Duration::zero())
        .filter(|lifetime| Utc::now().checked_add_signed(*lifetime).is_some())
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: amount.to_string(),
        })
}
