//! Keeps the stored access token usable.

use crate::{
    api::AuthService,
    session::{is_likely_expired, SessionStore, Token},
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Returns a valid access token, refreshing it at most once per call.
///
/// There is no concurrency guard here; callers that can race serialize
/// through the flow orchestrator.
#[derive(Clone)]
pub struct TokenReconciler {
    store: Arc<dyn SessionStore>,
    service: AuthService,
}

impl TokenReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, service: AuthService) -> Self {
        Self { store, service }
    }

    /// Current access token, refreshed first when it looks expired.
    ///
    /// `None` means the caller has to exchange an external credential. When
    /// the refresh path fails for any reason the store is cleared, so a stale
    /// pair is never retried.
    #[instrument(skip(self))]
    pub async fn ensure_valid_access_token(&self) -> Option<Token> {
        let session = self.store.get();
        let access = session.access_token?;

        if !is_likely_expired(Some(&access)) {
            return Some(access);
        }

        let Some(refresh) = session.refresh_token else {
            debug!("access token expired without a refresh token, clearing session");
            self.store.clear_role();
            return None;
        };

        match self.service.refresh(&refresh).await {
            Ok(tokens) => {
                let access = tokens.access_token.clone();
                self.store.set_session(tokens);
                debug!("access token refreshed");
                Some(access)
            }
            Err(err) => {
                warn!("token refresh failed, clearing session: {err}");
                self.store.clear_role();
                None
            }
        }
    }
}

impl std::fmt::Debug for TokenReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenReconciler")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        api::{ApiClient, ApiConfig},
        session::{MemoryStore, Role, Session, SessionTokens},
    };
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{any, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn token_expiring_in(seconds: i64) -> Token {
        let exp = crate::session::token::unix_now() + seconds;
        let payload = Base64UrlUnpadded::encode_string(json!({ "exp": exp }).to_string().as_bytes());
        Token::new(format!("header.{payload}.signature"))
    }

    fn reconciler(uri: String, store: Arc<dyn SessionStore>) -> TokenReconciler {
        let service = AuthService::new(ApiClient::server(ApiConfig::new(uri)).unwrap());
        TokenReconciler::new(store, service)
    }

    fn stored(access: Option<Token>, refresh: Option<&str>) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_session(Session {
            access_token: access,
            refresh_token: refresh.map(Token::from),
            active_role: Some(Role::Locataire),
        }))
    }

    /// Backend that fails the test if it sees any request.
    async fn silent_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn fresh_token_needs_no_network() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = silent_server().await;

        let fresh = token_expiring_in(3600);
        let store = stored(Some(fresh.clone()), Some("R1"));
        let token = reconciler(server.uri(), store.clone())
            .ensure_valid_access_token()
            .await;

        assert_eq!(token, Some(fresh));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({ "refreshToken": "R1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "A2",
                "refreshToken": "R2",
                "activeRole": "LOCATAIRE"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = stored(Some(token_expiring_in(-60)), Some("R1"));
        let token = reconciler(server.uri(), store.clone())
            .ensure_valid_access_token()
            .await;

        assert_eq!(token, Some(Token::from("A2")));
        assert_eq!(
            store.get(),
            Session::from(SessionTokens {
                access_token: Token::from("A2"),
                refresh_token: Token::from("R2"),
                active_role: Some(Role::Locataire),
            })
        );
    }

    #[tokio::test]
    async fn token_inside_skew_window_is_refreshed() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "A2",
                "refreshToken": "R2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = stored(Some(token_expiring_in(5)), Some("R1"));
        let token = reconciler(server.uri(), store)
            .ensure_valid_access_token()
            .await;
        assert_eq!(token, Some(Token::from("A2")));
    }

    #[tokio::test]
    async fn expired_without_refresh_clears_store() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = silent_server().await;

        let store = stored(Some(token_expiring_in(-60)), None);
        let token = reconciler(server.uri(), store.clone())
            .ensure_valid_access_token()
            .await;

        assert_eq!(token, None);
        assert!(store.get().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_clears_store() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let store = stored(Some(token_expiring_in(-60)), Some("R1"));
        let token = reconciler(server.uri(), store.clone())
            .ensure_valid_access_token()
            .await;

        assert_eq!(token, None);
        assert!(store.get().is_empty());
    }

    #[tokio::test]
    async fn undecodable_token_counts_as_expired() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = silent_server().await;

        let store = stored(Some(Token::from("opaque")), None);
        let token = reconciler(server.uri(), store.clone())
            .ensure_valid_access_token()
            .await;
        assert_eq!(token, None);
        assert!(store.get().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_returns_none_without_clearing() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let token = reconciler("http://127.0.0.1:9".to_string(), store)
            .ensure_valid_access_token()
            .await;
        assert_eq!(token, None);
    }
}
