use crate::{
    api::{ApiClient, AuthService},
    auth::{AuthFlowOrchestrator, FlowOutcome, StaticIdentity},
    cli::globals::GlobalArgs,
    navigation::RecordingNavigator,
    session::Token,
};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub external_token: Token,
    pub next: Option<String>,
}

/// Run one reconciliation against the stored session and print where the
/// user would land.
/// # Errors
/// Returns an error if the store cannot be opened or the flow does not end
/// in a destination.
pub async fn execute(args: Args) -> Result<()> {
    let store = Arc::new(args.globals.open_store()?);
    let service = AuthService::new(ApiClient::server(args.globals.api_config())?);
    let orchestrator = AuthFlowOrchestrator::new(
        Arc::new(StaticIdentity::signed_in(args.external_token)),
        store,
        service,
        Arc::new(RecordingNavigator::new()),
        args.globals.routes(),
    );

    match orchestrator.reconcile_and_route(args.next.as_deref()).await {
        FlowOutcome::Routed {
            destination,
            profile,
        } => {
            info!(role = ?profile.role, "reconciled");
            println!("{destination}");
            Ok(())
        }
        FlowOutcome::NoExternalSession => bail!("No external session to reconcile"),
        FlowOutcome::ExchangeFailed => bail!("Login exchange failed"),
        FlowOutcome::ProfileUnavailable { status } => match status {
            Some(status) => bail!("Profile unavailable ({status})"),
            None => bail!("Profile unavailable"),
        },
    }
}
