//! `HttpOnly` cookies holding the internal token pair.

use crate::session::{SessionTokens, Token};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

pub const ACCESS_COOKIE: &str = "rentauth_access";
pub const REFRESH_COOKIE: &str = "rentauth_refresh";

/// Build an `HttpOnly` cookie for `token`.
pub fn token_cookie(
    name: &str,
    token: &Token,
    max_age_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}",
        token.expose()
    );
    // Only mark cookies secure when the app is served over HTTPS.
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Cookies for both tokens of `tokens`.
pub fn session_cookies(
    tokens: &SessionTokens,
    max_age_seconds: u64,
    secure: bool,
) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
    Ok(vec![
        token_cookie(ACCESS_COOKIE, &tokens.access_token, max_age_seconds, secure)?,
        token_cookie(REFRESH_COOKIE, &tokens.refresh_token, max_age_seconds, secure)?,
    ])
}

/// Cookies expiring both tokens.
pub fn cleared_cookies(secure: bool) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
    Ok(vec![
        clear_cookie(ACCESS_COOKIE, secure)?,
        clear_cookie(REFRESH_COOKIE, secure)?,
    ])
}

/// Value of cookie `name` from the request's `Cookie` headers. Empty values
/// count as missing.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<Token> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            (key == name && !val.is_empty()).then(|| Token::from(val))
        })
}
