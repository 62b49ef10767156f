//! Combined state of the two session sources.
//!
//! The external provider and the internal authorization service each hold a
//! session of their own. Only when both agree is the user allowed to reach
//! protected resources.

use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No external session.
    #[default]
    Anonymous,
    /// Signed in with the external provider, no internal session yet.
    ExternalOnly,
    /// Both sessions present.
    Reconciled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// The external provider reported a session.
    ExternalAuthenticated,
    /// The provider reported no session.
    ExternalMissing,
    /// An internal session was created or refreshed.
    InternalEstablished,
    /// The internal session was cleared after a failed refresh or exchange.
    InternalLost,
    SignedOut,
}

impl AuthState {
    /// State implied by which sessions are present. An internal session
    /// without an external one is stale and counts as anonymous.
    #[must_use]
    pub fn from_sources(external: bool, internal: bool) -> Self {
        match (external, internal) {
            (false, _) => AuthState::Anonymous,
            (true, false) => AuthState::ExternalOnly,
            (true, true) => AuthState::Reconciled,
        }
    }

    #[must_use]
    pub fn on(self, event: AuthEvent) -> Self {
        match (self, event) {
            (_, AuthEvent::SignedOut | AuthEvent::ExternalMissing) => AuthState::Anonymous,
            (AuthState::Anonymous, AuthEvent::ExternalAuthenticated) => AuthState::ExternalOnly,
            (AuthState::ExternalOnly, AuthEvent::InternalEstablished) => AuthState::Reconciled,
            (AuthState::Reconciled, AuthEvent::InternalLost) => AuthState::ExternalOnly,
            (state, _) => state,
        }
    }

    /// Whether protected calls may go out.
    #[must_use]
    pub fn is_reconciled(self) -> bool {
        self == AuthState::Reconciled
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::Anonymous => "anonymous",
            AuthState::ExternalOnly => "external-only",
            AuthState::Reconciled => "reconciled",
        };
        f.write_str(name)
    }
}
