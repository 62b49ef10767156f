//! Single backend calls with a consistent timeout and error policy.
//!
//! A client is bound to one execution context. In the server context the
//! caller hands over a bearer token that is attached as-is. In the browser
//! context every path is rewritten under the relay prefix and credentials
//! ride in the client's cookie jar; the client never sets `Authorization`
//! itself.

use super::ApiError;
use crate::{session::Token, APP_USER_AGENT};
use reqwest::{header::CONTENT_TYPE, Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info_span, instrument, Instrument};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);
/// Path prefix served by the relay.
pub const DEFAULT_RELAY_PREFIX: &str = "/api/proxy";
pub const DEFAULT_RELAY_BASE_URL: &str = "http://localhost:3000";

/// Endpoints used to reach the backend in either context.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Internal authorization service, reached directly in the server context.
    pub api_base_url: String,
    /// Origin serving the relay, reached in the browser context.
    pub relay_base_url: String,
    pub relay_prefix: String,
    pub timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            relay_base_url: DEFAULT_RELAY_BASE_URL.to_string(),
            relay_prefix: DEFAULT_RELAY_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_relay(mut self, relay_base_url: impl Into<String>, relay_prefix: &str) -> Self {
        self.relay_base_url = relay_base_url.into();
        self.relay_prefix = relay_prefix.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Where the calling code runs, which decides how credentials are obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Trusted: the caller holds the bearer token and supplies it per call.
    Server,
    /// Untrusted: tokens stay in `HttpOnly` cookies handled by the relay.
    Browser,
}

/// Per-call options.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Bearer token for the server context; ignored in the browser context.
    pub bearer: Option<Token>,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be encoded as JSON.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|err| ApiError::Config(format!("Failed to encode request: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }

    #[must_use]
    pub fn bearer(mut self, token: Token) -> Self {
        self.bearer = Some(token);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    context: ExecutionContext,
}

impl ApiClient {
    /// Client for trusted code that supplies bearer tokens explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn server(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            config,
            context: ExecutionContext::Server,
        })
    }

    /// Client that talks to the relay and keeps its cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn browser(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .cookie_store(true)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            config,
            context: ExecutionContext::Browser,
        })
    }

    #[must_use]
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Absolute URL for `path` in this client's context.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        match self.context {
            ExecutionContext::Server => build_url_with_base(&self.config.api_base_url, path),
            ExecutionContext::Browser => {
                let prefix = self.config.relay_prefix.trim().trim_end_matches('/');
                let relayed = format!("{prefix}/{}", path.trim().trim_start_matches('/'));
                build_url_with_base(&self.config.relay_base_url, &relayed)
            }
        }
    }

    /// Perform one call and decode the body into `T`.
    ///
    /// Text bodies decode as a JSON string and empty bodies as `null`, so
    /// `T = String`, `T = Value` and `T = ()` all work for non-JSON endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Timeout`] when the timeout elapses, [`ApiError::Http`]
    /// for any non-2xx status, [`ApiError::Network`] for transport failures and
    /// [`ApiError::Decode`] when the body does not fit `T`.
    #[instrument(skip(self, options), fields(context = ?self.context))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let body = self.request_value(path, options).await?;
        serde_json::from_value(body)
            .map_err(|err| ApiError::Decode(format!("Failed to decode response: {err}")))
    }

    async fn request_value(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let url = self.url_for(path);
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let method = options.method.clone();

        let mut builder = self.http.request(options.method, &url);

        match (self.context, options.bearer) {
            (ExecutionContext::Server, Some(token)) => {
                builder = builder.bearer_auth(token.expose());
            }
            (ExecutionContext::Browser, Some(_)) => {
                debug!("ignoring explicit bearer token in browser context");
            }
            (_, None) => {}
        }

        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let span = info_span!("api.request", http.method = %method, url = %url);
        let exchange = async move {
            let response = builder.send().await.map_err(map_request_error)?;
            read_response(response).await
        };

        // Dropping the in-flight future on elapse cancels the request.
        match tokio::time::timeout(timeout, exchange).instrument(span).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "request timed out");
                Err(ApiError::Timeout)
            }
        }
    }
}

/// Builds a URL from an explicit base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

fn map_request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Parse the body as JSON when the server says so, otherwise as text, and
/// turn non-2xx statuses into errors carrying that body.
async fn read_response(response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"));

    let text = response
        .text()
        .await
        .map_err(|err| ApiError::Network(format!("Failed to read response: {err}")))?;

    let body = if text.trim().is_empty() {
        Value::Null
    } else if is_json {
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) if status.is_success() => {
                return Err(ApiError::Decode(format!("Failed to decode response: {err}")));
            }
            Err(_) => Value::String(text),
        }
    } else {
        Value::String(text)
    };

    if status.is_success() {
        Ok(body)
    } else {
        Err(ApiError::http(status.as_u16(), body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[test]
    fn url_for_server_context() {
        let client = ApiClient::server(ApiConfig::new("https://api.example.test/")).unwrap();
        assert_eq!(
            client.url_for("/auth/me"),
            "https://api.example.test/auth/me"
        );
    }

    #[test]
    fn url_for_browser_context_uses_relay_prefix() {
        let config = ApiConfig::new("https://api.example.test")
            .with_relay("https://app.example.test", "/api/proxy/");
        let client = ApiClient::browser(config).unwrap();
        assert_eq!(
            client.url_for("auth/me"),
            "https://app.example.test/api/proxy/auth/me"
        );
    }

    #[tokio::test]
    async fn server_context_attaches_bearer_and_parses_json() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vehicles"))
            .and(header("authorization", "Bearer A1"))
            .and(body_json(json!({ "plate": "AB-123-CD" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::server(ApiConfig::new(server.uri())).unwrap();
        let options = RequestOptions::method(Method::POST)
            .json(&json!({ "plate": "AB-123-CD" }))
            .unwrap()
            .bearer(Token::from("A1"));

        let created: Value = client.request("/vehicles", options).await.unwrap();
        assert_eq!(created, json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn non_2xx_carries_parsed_details() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({ "message": "Dates invalides", "field": "from" })),
            )
            .mount(&server)
            .await;

        let client = ApiClient::server(ApiConfig::new(server.uri())).unwrap();
        let err = client
            .request::<Value>("/bookings", RequestOptions::get())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Request failed (422): Dates invalides");
        assert_eq!(
            err.details(),
            Some(&json!({ "message": "Dates invalides", "field": "from" }))
        );
    }

    #[tokio::test]
    async fn text_bodies_are_returned_as_strings() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway upstream"))
            .mount(&server)
            .await;

        let client = ApiClient::server(ApiConfig::new(server.uri())).unwrap();
        let body: String = client.request("/health", RequestOptions::get()).await.unwrap();
        assert_eq!(body, "ok");

        let err = client
            .request::<Value>("/broken", RequestOptions::get())
            .await
            .unwrap_err();
        assert_eq!(err.details(), Some(&json!("bad gateway upstream")));
    }

    #[tokio::test]
    async fn timeout_surfaces_as_408() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = ApiClient::server(ApiConfig::new(server.uri())).unwrap();
        let err = client
            .request::<Value>(
                "/slow",
                RequestOptions::get().timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout));
        assert_eq!(err.status(), Some(408));
    }

    #[tokio::test]
    async fn browser_context_never_sends_authorization() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/proxy/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "role": "LOCATAIRE" })))
            .expect(1)
            .mount(&server)
            .await;

        let config = ApiConfig::new("http://unused.invalid").with_relay(server.uri(), "/api/proxy");
        let client = ApiClient::browser(config).unwrap();
        let _: Value = client
            .request("/auth/me", RequestOptions::get().bearer(Token::from("A1")))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests
            .iter()
            .all(|request| !request.headers.contains_key("authorization")));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let client = ApiClient::server(ApiConfig::new("http://127.0.0.1:9")).unwrap();
        let err = client
            .request::<Value>("/auth/me", RequestOptions::get())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)), "{err:?}");
    }
}
