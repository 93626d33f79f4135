// Cookies written by the middleware
// Both cookies are Secure, HttpOnly and scoped to the whole site.

use axum::http::{HeaderName, header};
use axum::response::AppendHeaders;
use axum_extra::extract::cookie::Cookie;

use super::types::{COOKIE_CALLBACK_NAME, COOKIE_TOKEN_NAME, SessionToken};

fn base_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .secure(true)
        .http_only(true)
        .path("/")
        .build()
}

fn cleared_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new());
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Session cookie carrying a freshly signed token
pub fn session_cookie(token: SessionToken) -> Cookie<'static> {
    base_cookie(COOKIE_TOKEN_NAME, token.expose().to_string())
}

/// Expire the session cookie
pub fn cleared_session_cookie() -> Cookie<'static> {
    cleared_cookie(COOKIE_TOKEN_NAME)
}

/// Pending-redirect marker remembering where the user was going
pub fn callback_cookie(path: &str) -> Cookie<'static> {
    base_cookie(COOKIE_CALLBACK_NAME, path.to_string())
}

/// Expire the pending-redirect marker
pub fn cleared_callback_cookie() -> Cookie<'static> {
    cleared_cookie(COOKIE_CALLBACK_NAME)
}

/// `Set-Cookie` headers carrying the cookies verbatim, without percent-encoding
pub fn set_cookies<I>(cookies: I) -> AppendHeaders<Vec<(HeaderName, String)>>
where
    I: IntoIterator<Item = Cookie<'static>>,
{
    AppendHeaders(
        cookies
            .into_iter()
            .map(|cookie| (header::SET_COOKIE, cookie.to_string()))
            .collect(),
    )
}
