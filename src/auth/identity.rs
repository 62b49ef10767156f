//! External identity provider seam.

use crate::{api::ApiError, session::Token};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

/// Signed-in state reported by the external provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalSession {
    /// Credential accepted by the internal login exchange.
    pub access_token: Token,
}

/// The provider that handles signup, password, OAuth and one-time-code
/// logins. This layer only reads its session and asks it to sign out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_session(&self) -> Option<ExternalSession>;

    async fn sign_out(&self) -> Result<(), ApiError>;
}

/// Provider backed by a token handed over at startup, e.g. on the command
/// line.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    session: RwLock<Option<ExternalSession>>,
}

impl StaticIdentity {
    #[must_use]
    pub fn signed_in(access_token: Token) -> Self {
        Self {
            session: RwLock::new(Some(ExternalSession { access_token })),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_session(&self) -> Option<ExternalSession> {
        self.session.read().clone()
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        if self.session.write().take().is_some() {
            info!("external session signed out");
        }
        Ok(())
    }
}
