//! Auth cookies. Both are http-only; `Secure` follows `COOKIE_SECURE`.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn auth_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

pub fn access_cookie(token: &str, ttl: chrono::Duration, secure: bool) -> Cookie<'static> {
    auth_cookie(ACCESS_TOKEN_COOKIE, token.to_string(), Duration::seconds(ttl.num_seconds()), secure)
}

pub fn refresh_cookie(token: &str, ttl: chrono::Duration, secure: bool) -> Cookie<'static> {
    auth_cookie(REFRESH_TOKEN_COOKIE, token.to_string(), Duration::seconds(ttl.num_seconds()), secure)
}

/// Expired, empty cookies that make the browser drop both tokens.
pub fn cleared_cookies(secure: bool) -> [Cookie<'static>; 2] {
    [
        auth_cookie(ACCESS_TOKEN_COOKIE, String::new(), Duration::ZERO, secure),
        auth_cookie(REFRESH_TOKEN_COOKIE, String::new(), Duration::ZERO, secure),
    ]
}
