use crate::cli::actions::{reconcile, relay, session, Action};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Relay(args) => relay::execute(args).await,
        Action::Reconcile(args) => reconcile::execute(args).await,
        Action::Session(args) => session::execute(args),
    }
}
