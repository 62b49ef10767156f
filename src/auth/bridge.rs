//! Exchange of an external-provider credential for an internal session.

use crate::{
    api::{ApiError, AuthService},
    session::{Session, SessionStore, Token},
};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct IdentityBridge {
    store: Arc<dyn SessionStore>,
    service: AuthService,
}

impl IdentityBridge {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, service: AuthService) -> Self {
        Self { store, service }
    }

    /// Create a new internal session from `external_token` and store it.
    ///
    /// Every call creates a new session server-side and replaces whatever the
    /// store held.
    ///
    /// # Errors
    ///
    /// Returns the login error unchanged; the store is not touched.
    #[instrument(skip_all)]
    pub async fn exchange(&self, external_token: &Token) -> Result<Session, ApiError> {
        let tokens = self.service.login(external_token).await?;
        if let Some(role) = tokens.active_role {
            info!(%role, "internal session created");
        } else {
            info!("internal session created");
        }
        self.store.set_session(tokens);
        Ok(self.store.get())
    }
}

impl std::fmt::Debug for IdentityBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityBridge")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
