pub mod auth;
pub mod cookie_auth;
