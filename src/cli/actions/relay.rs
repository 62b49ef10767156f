use crate::{
    cli::globals::GlobalArgs,
    relay::{self, RelayState},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub port: u16,
    pub cookie_secure: bool,
}

/// Run the relay until Ctrl-C.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let config = args
        .globals
        .relay_config()
        .with_cookie_secure(args.cookie_secure);
    debug!(
        backend = %config.backend_url,
        prefix = %config.prefix,
        cookie_secure = config.cookie_secure,
        "relay configuration"
    );
    let state = Arc::new(RelayState::new(config)?);

    let listener = TcpListener::bind(format!("::0:{}", args.port))
        .await
        .with_context(|| format!("Failed to bind port {}", args.port))?;

    relay::serve(listener, state, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
    })
    .await
}
