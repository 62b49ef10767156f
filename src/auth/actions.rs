//! Session actions available once the flow has run: role switch, profile
//! completion, sign-out and protected calls.

use super::{
    flow::AuthFlowOrchestrator,
    state::{AuthEvent, AuthState},
};
use crate::{
    api::{ApiError, Profile, RequestOptions},
    session::{Role, Session, Token},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, instrument, warn};

impl AuthFlowOrchestrator {
    /// Current combined state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.context.state()
    }

    /// Re-derive the state from both session sources.
    pub async fn sync_state(&self) -> AuthState {
        let external = self.context.identity.current_session().await.is_some();
        let internal = self.context.store.get().access_token.is_some();
        let mut event = if external {
            AuthEvent::ExternalAuthenticated
        } else {
            AuthEvent::ExternalMissing
        };
        let mut state = self.context.apply(event);
        if external {
            event = if internal {
                AuthEvent::InternalEstablished
            } else {
                AuthEvent::InternalLost
            };
            state = self.context.apply(event);
        }
        debug_assert_eq!(state, AuthState::from_sources(external, internal));
        state
    }

    /// Read-only snapshot of the internal session.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        let session = self.context.store.get();
        (!session.is_empty()).then_some(session)
    }

    async fn require_token(&self) -> Result<Token, ApiError> {
        match self.context.reconciler.ensure_valid_access_token().await {
            Some(token) => Ok(token),
            None => {
                self.context.apply(AuthEvent::InternalLost);
                Err(ApiError::NotReconciled)
            }
        }
    }

    /// Protected call in the server context.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotReconciled`] unless the sessions are
    /// reconciled and a valid access token is available, otherwise the
    /// request error unchanged.
    #[instrument(skip(self, options))]
    pub async fn authenticated_request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        if !self.state().is_reconciled() {
            return Err(ApiError::NotReconciled);
        }
        let token = self.require_token().await?;
        self.context
            .service
            .client()
            .request(path, options.bearer(token))
            .await
    }

    /// Switch the active role and record the one the server settled on.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotReconciled`] without a usable session, or the
    /// request error; the store is unchanged on error.
    #[instrument(skip(self))]
    pub async fn switch_role(&self, role: Role) -> Result<Role, ApiError> {
        let token = self.require_token().await?;
        let granted = self.context.service.switch_role(&token, role).await?;
        self.context.store.set_active_role(granted);
        info!(%granted, "active role switched");
        Ok(granted)
    }

    /// Submit the profile form, creating the internal session first when
    /// registration has only produced an external one. The exchange is
    /// serialized with a running flow, so both end up on the same session.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotReconciled`] when no session can be obtained,
    /// or the request error with the server's validation body in
    /// [`ApiError::details`].
    #[instrument(skip_all)]
    pub async fn complete_profile(&self, fields: &Value) -> Result<Profile, ApiError> {
        let token = match self.context.identity.current_session().await {
            Some(external) => self
                .context
                .access_token_or_exchange(&external.access_token)
                .await
                .ok_or(ApiError::NotReconciled)?,
            None => self.require_token().await?,
        };
        self.context.service.complete_profile(&token, fields).await
    }

    /// Clear the internal session, then sign out of the external provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; the internal session is cleared either
    /// way.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.context.store.clear_role();
        self.context.apply(AuthEvent::SignedOut);
        if let Err(err) = self.context.identity.sign_out().await {
            warn!("external sign-out failed: {err}");
            return Err(err);
        }
        info!("signed out");
        Ok(())
    }
}
