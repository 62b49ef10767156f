use crate::{
    cli::globals::GlobalArgs,
    session::{decode, is_likely_expired, Session, SessionStore},
};
use anyhow::Result;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Show,
    Clear,
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: Command,
}

/// # Errors
/// Returns an error if the store cannot be opened.
pub fn execute(args: Args) -> Result<()> {
    let store = args.globals.open_store()?;
    match args.command {
        Command::Show => {
            println!("{}", serde_json::to_string_pretty(&summary(&store.get()))?);
        }
        Command::Clear => {
            store.clear_role();
            println!("Session cleared: {}", store.path().display());
        }
    }
    Ok(())
}

/// Printable view of a session. Token values are never included.
fn summary(session: &Session) -> Value {
    let access = session.access_token.as_ref();
    json!({
        "accessToken": access.map(|_| "present"),
        "accessTokenExp": access.and_then(|token| decode(token.expose())).and_then(|claims| claims.exp),
        "likelyExpired": access.map(|token| is_likely_expired(Some(token))),
        "refreshToken": session.refresh_token.as_ref().map(|_| "present"),
        "activeRole": session.role(),
    })
}
