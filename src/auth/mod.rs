//! Reconciliation between the external identity provider and the internal
//! authorization service.

mod actions;
pub mod bridge;
pub mod flow;
pub mod identity;
pub mod reconciler;
pub mod routing;
pub mod state;

pub use bridge::IdentityBridge;
pub use flow::{AuthFlowOrchestrator, FlowOutcome};
pub use identity::{ExternalSession, IdentityProvider, StaticIdentity};
pub use reconciler::TokenReconciler;
pub use routing::{route, Routes, DEFAULT_SIGN_IN_PATH};
pub use state::{AuthEvent, AuthState};
