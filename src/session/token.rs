//! Client-side reading of the `exp` claim carried by bearer tokens.
//!
//! Nothing here verifies a signature. The result only decides whether a
//! refresh should be attempted before a call; the internal authorization
//! service remains the sole authority on token validity.

use super::Token;
use base64ct::{Base64Unpadded, Encoding};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tokens expiring within this many seconds are treated as expired, covering
/// clock drift and request latency.
pub const EXPIRY_SKEW_SECONDS: i64 = 10;

/// Claims read from the middle segment of a token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenClaims {
    /// Expiry in seconds since the Unix epoch.
    pub exp: Option<i64>,
}

/// Decode the claims segment of `token`.
///
/// Returns `None` unless the token has exactly three dot-separated segments
/// and the middle one is base64url-encoded JSON.
#[must_use]
pub fn decode(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    // Map the URL alphabet onto the standard one; padding is optional.
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = Base64Unpadded::decode_vec(&normalized).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;

    let exp = claims
        .get("exp")
        .and_then(Value::as_f64)
        .map(|exp| exp.trunc() as i64);

    Some(TokenClaims { exp })
}

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

/// Whether `token` should be refreshed before use, judged against the current
/// clock.
#[must_use]
pub fn is_likely_expired(token: Option<&Token>) -> bool {
    is_likely_expired_at(token, unix_now())
}

/// Absent, undecodable and `exp`-less tokens count as expired, as does any
/// token whose `exp` falls within [`EXPIRY_SKEW_SECONDS`] of `now_unix_seconds`.
#[must_use]
pub fn is_likely_expired_at(token: Option<&Token>, now_unix_seconds: i64) -> bool {
    let Some(claims) = token.and_then(|token| decode(token.expose())) else {
        return true;
    };

    match claims.exp {
        Some(exp) => exp <= now_unix_seconds.saturating_add(EXPIRY_SKEW_SECONDS),
        None => true,
    }
}
