//! Relay-local session endpoint.

use crate::relay::{cookies, RelayState};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

/// Expire both token cookies.
pub async fn logout(Extension(state): Extension<Arc<RelayState>>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    match cookies::cleared_cookies(state.config.cookie_secure) {
        Ok(values) => {
            for value in values {
                headers.append(SET_COOKIE, value);
            }
        }
        Err(err) => error!("Failed to build logout cookies: {err}"),
    }
    (StatusCode::NO_CONTENT, headers)
}
