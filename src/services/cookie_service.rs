use cookie::SameSite;
use time::{Duration, OffsetDateTime};
use tower_cookies::{Cookie, Cookies};

use crate::models::jwt::{IssuedToken, TokenPair};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
const HTTP_ONLY: bool = true;
const SAME_SITE: SameSite = SameSite::Strict;

/// Builds and applies the session cookies. Every cookie's `Expires` mirrors
/// the `exp` claim of the token it carries.
#[derive(Debug, Clone, Copy)]
pub struct CookieService {
    secure: bool,
}

impl CookieService {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    pub fn set_auth_cookies(&self, cookies: &Cookies, pair: &TokenPair) {
        cookies.add(self.create_cookie(REFRESH_TOKEN_COOKIE, &pair.refresh));
        cookies.add(self.create_cookie(ACCESS_TOKEN_COOKIE, &pair.access));
    }

    /// Only the access cookie is rewritten on rotation.
    pub fn set_access_cookie(&self, cookies: &Cookies, access: &IssuedToken) {
        cookies.add(self.create_cookie(ACCESS_TOKEN_COOKIE, access));
    }

    pub fn clear_auth_cookies(&self, cookies: &Cookies) {
        cookies.add(self.create_removal_cookie(ACCESS_TOKEN_COOKIE));
        cookies.add(self.create_removal_cookie(REFRESH_TOKEN_COOKIE));
    }

    pub fn extract(cookies: &Cookies, name: &str) -> Option<String> {
        cookies
            .get(name)
            .map(|c| c.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn create_cookie(&self, name: &'static str, issued: &IssuedToken) -> Cookie<'static> {
        let mut builder = Cookie::build((name, issued.token.clone()))
            .secure(self.secure)
            .http_only(HTTP_ONLY)
            .same_site(SAME_SITE)
            .path("/");

        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(issued.expires_at()) {
            builder = builder.expires(expires);
        }

        builder.build()
    }

    fn create_removal_cookie(&self, name: &'static str) -> Cookie<'static> {
        Cookie::build((name, ""))
            .secure(self.secure)
            .http_only(HTTP_ONLY)
            .same_site(SAME_SITE)
            .path("/")
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::now_utc() - Duration::days(1))
            .build()
    }
}
