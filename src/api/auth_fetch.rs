//! Authenticated requests from the browser context.
//!
//! Credentials never pass through here: the relay attaches them from the
//! cookie jar and refreshes them on `401`. This wrapper only gives the relay
//! time to do that before giving up on the session.

use super::{ApiClient, ApiError, RequestOptions, RetryPolicy};
use crate::{auth::routing::DEFAULT_SIGN_IN_PATH, navigation::Navigator};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct AuthFetch {
    client: ApiClient,
    policy: RetryPolicy,
    navigator: Arc<dyn Navigator>,
    sign_in_path: String,
}

impl AuthFetch {
    #[must_use]
    pub fn new(client: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            policy: RetryPolicy::unauthorized(),
            navigator,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Perform `path` with retry on `401`.
    ///
    /// When every attempt came back `401` the user is sent to the sign-in
    /// page with `expired=1` through a full-page navigation.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::SessionExpired`] once retries run out, or the first
    /// non-`401` error unchanged.
    #[instrument(skip(self, options))]
    pub async fn auth_fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let result = self
            .policy
            .run(|_| self.client.request::<T>(path, options.clone()))
            .await;

        match result {
            Err(err) if err.is_unauthorized() => {
                warn!(
                    attempts = self.policy.max_attempts,
                    "authorization retries exhausted, redirecting to sign-in"
                );
                self.navigator
                    .force_navigate(&format!("{}?expired=1", self.sign_in_path));
                Err(ApiError::SessionExpired)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for AuthFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFetch")
            .field("client", &self.client)
            .field("policy", &self.policy)
            .field("sign_in_path", &self.sign_in_path)
            .finish_non_exhaustive()
    }
}
