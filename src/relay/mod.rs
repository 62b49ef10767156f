//! Same-origin relay between browser code and the backend.
//!
//! Browser requests under the relay prefix are forwarded to the backend with
//! the access token taken from an `HttpOnly` cookie. Token material never
//! reaches the browser: login and refresh responses are rewritten so that
//! only the active role is returned, and the tokens travel in cookies.

use crate::{
    api::{ApiClient, ApiConfig, AuthService},
    APP_USER_AGENT,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{any, get, post},
    Extension, Router,
};
use reqwest::Client;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod cookies;
pub mod handlers;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Lifetime of the token cookies; the backend decides actual validity.
pub const DEFAULT_COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Base URL of the internal authorization service and backend.
    pub backend_url: String,
    /// Path prefix the relay answers under, e.g. `/api/proxy`.
    pub prefix: String,
    /// Add `Secure` to the cookies; enable when served over HTTPS.
    pub cookie_secure: bool,
    pub cookie_max_age: Duration,
    pub timeout: Duration,
}

impl RelayConfig {
    #[must_use]
    pub fn new(backend_url: impl Into<String>, prefix: &str) -> Self {
        Self {
            backend_url: backend_url.into(),
            prefix: normalize_prefix(prefix),
            cookie_secure: false,
            cookie_max_age: DEFAULT_COOKIE_MAX_AGE,
            timeout: crate::api::client::DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Shared state of the relay handlers.
#[derive(Debug)]
pub struct RelayState {
    pub(crate) config: RelayConfig,
    pub(crate) http: Client,
    pub(crate) auth: AuthService,
}

impl RelayState {
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build relay HTTP client")?;
        let api = ApiClient::server(
            ApiConfig::new(config.backend_url.clone()).with_timeout(config.timeout),
        )?;
        Ok(Self {
            config,
            http,
            auth: AuthService::new(api),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Leading slash, no trailing slash; an empty prefix mounts at the root.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Build the relay router.
#[must_use]
pub fn router(state: Arc<RelayState>) -> Router {
    let prefix = state.config.prefix.clone();
    Router::new()
        .route("/health", get(handlers::health))
        .route(&format!("{prefix}/session/logout"), post(handlers::logout))
        .route(&format!("{prefix}/*path"), any(handlers::proxy))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Serve the relay on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve<F>(listener: TcpListener, state: Arc<RelayState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {addr}");
    }

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Gracefully shutdown");
        })
        .await
        .context("Relay server failed")?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("/api/proxy"), "/api/proxy");
        assert_eq!(normalize_prefix("api/proxy/"), "/api/proxy");
        assert_eq!(normalize_prefix(" / "), "");
    }

    #[test]
    fn config_defaults() {
        let config = RelayConfig::new("http://backend", "/api/proxy/");
        assert_eq!(config.prefix, "/api/proxy");
        assert!(!config.cookie_secure);
        assert_eq!(config.cookie_max_age, DEFAULT_COOKIE_MAX_AGE);
    }
}
