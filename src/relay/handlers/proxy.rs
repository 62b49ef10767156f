//! Forwarding of relayed requests to the backend.

use crate::{
    relay::{cookies, RelayState, REQUEST_ID_HEADER},
    session::{SessionTokens, Token},
};
use axum::{
    body::{Body, Bytes},
    extract::Extension,
    http::{
        header::{
            ACCEPT, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, PROXY_AUTHENTICATE,
            PROXY_AUTHORIZATION, SET_COOKIE, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
        },
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn, Instrument};

/// Upstream paths whose successful responses carry a token pair.
const TOKEN_PATHS: [&str; 2] = ["auth/login", "auth/refresh"];

/// Connection-scoped response headers that must not be relayed. The body is
/// re-framed, so its length is dropped too.
const HOP_BY_HOP: [HeaderName; 8] = [
    CONNECTION,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
    CONTENT_LENGTH,
];

struct Upstream {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Forward `{prefix}/*path` to the backend.
///
/// A `401` with a refresh cookie present triggers one silent refresh and one
/// retry. Token pairs in login and refresh responses are moved into cookies.
pub async fn proxy(
    Extension(state): Extension<Arc<RelayState>>,
    uri: Uri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // The raw path keeps its percent-encoding, so `%3F` or `%23` reach the
    // backend as path characters.
    let path = relayed_path(uri.path(), &state.config.prefix);
    let url = upstream_url(&state.config.backend_url, &path, uri.query());
    let secure = state.config.cookie_secure;
    let max_age = state.config.cookie_max_age.as_secs();

    let access = cookies::read_cookie(&headers, cookies::ACCESS_COOKIE);
    let mut upstream = match forward(&state, &method, &url, &headers, &body, access.as_ref()).await
    {
        Ok(upstream) => upstream,
        Err(response) => return response,
    };

    let mut set_cookies = Vec::new();

    if upstream.status == StatusCode::UNAUTHORIZED {
        if let Some(refresh) = cookies::read_cookie(&headers, cookies::REFRESH_COOKIE) {
            match state.auth.refresh(&refresh).await {
                Ok(tokens) => {
                    debug!("silent refresh succeeded, retrying request");
                    upstream = match forward(
                        &state,
                        &method,
                        &url,
                        &headers,
                        &body,
                        Some(&tokens.access_token),
                    )
                    .await
                    {
                        Ok(upstream) => upstream,
                        Err(response) => return response,
                    };
                    set_cookies = cookies::session_cookies(&tokens, max_age, secure)
                        .unwrap_or_else(|err| {
                            error!("Failed to build session cookies: {err}");
                            Vec::new()
                        });
                }
                Err(err) => {
                    warn!("silent refresh failed, clearing cookies: {err}");
                    set_cookies = cookies::cleared_cookies(secure).unwrap_or_else(|err| {
                        error!("Failed to build logout cookies: {err}");
                        Vec::new()
                    });
                }
            }
        }
    }

    if upstream.status.is_success() && TOKEN_PATHS.contains(&path.as_str()) {
        if let Ok(tokens) = serde_json::from_slice::<SessionTokens>(&upstream.body) {
            match cookies::session_cookies(&tokens, max_age, secure) {
                Ok(values) => set_cookies = values,
                Err(err) => error!("Failed to build session cookies: {err}"),
            }
            let body = Json(json!({ "activeRole": tokens.active_role }));
            return with_cookies(
                (upstream.status, body).into_response(),
                set_cookies,
            );
        }
    }

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = end_to_end(upstream.headers);
    with_cookies(response, set_cookies)
}

fn relayed_path(request_path: &str, prefix: &str) -> String {
    request_path
        .strip_prefix(prefix)
        .unwrap_or(request_path)
        .trim_start_matches('/')
        .to_string()
}

fn end_to_end(mut headers: HeaderMap) -> HeaderMap {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}

fn upstream_url(backend_url: &str, path: &str, query: Option<&str>) -> String {
    let base = backend_url.trim().trim_end_matches('/');
    match query {
        Some(query) if !query.is_empty() => format!("{base}/{path}?{query}"),
        _ => format!("{base}/{path}"),
    }
}

fn with_cookies(mut response: Response, cookies: Vec<HeaderValue>) -> Response {
    for cookie in cookies {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

/// One upstream call. Transport failures are turned into the response sent
/// back to the browser.
async fn forward(
    state: &RelayState,
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: &Bytes,
    access: Option<&Token>,
) -> Result<Upstream, Response> {
    let mut request = state.http.request(method.clone(), url);

    for name in [CONTENT_TYPE, ACCEPT] {
        if let Some(value) = headers.get(&name) {
            request = request.header(name, value.clone());
        }
    }
    if let Some(request_id) = headers.get(REQUEST_ID_HEADER) {
        request = request.header(REQUEST_ID_HEADER, request_id.clone());
    }
    if let Some(token) = access {
        request = request.bearer_auth(token.expose());
    }
    if !body.is_empty() {
        request = request.body(body.clone());
    }

    let span = info_span!("relay.forward", http.method = %method, url = %url);
    let result = async {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>(Upstream {
            status,
            headers,
            body,
        })
    }
    .instrument(span)
    .await;

    result.map_err(|err| {
        error!("Upstream request failed: {err}");
        let status = if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        (
            status,
            Json(json!({ "message": "Unable to reach the server" })),
        )
            .into_response()
    })
}
