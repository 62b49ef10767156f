use crate::{
    cli::{
        actions::{reconcile, relay, session, Action},
        commands::{api, subcommands},
        globals::GlobalArgs,
    },
    session::Token,
};
use anyhow::{bail, Context, Result};
use std::{path::PathBuf, time::Duration};

fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let api_base_url = matches
        .get_one::<String>(api::ARG_API_BASE_URL)
        .cloned()
        .context("missing required argument: --api-base-url")?;
    url::Url::parse(&api_base_url)
        .with_context(|| format!("Invalid API base URL: {api_base_url}"))?;

    let mut globals = GlobalArgs::new(api_base_url);
    if let Some(relay_base_url) = matches.get_one::<String>(api::ARG_RELAY_BASE_URL) {
        globals.relay_base_url.clone_from(relay_base_url);
    }
    if let Some(prefix) = matches.get_one::<String>(api::ARG_RELAY_PREFIX) {
        globals.relay_prefix = crate::relay::normalize_prefix(prefix);
    }
    if let Some(timeout_ms) = matches.get_one::<u64>(api::ARG_TIMEOUT_MS) {
        globals.timeout = Duration::from_millis(*timeout_ms);
    }
    if let Some(dir) = matches.get_one::<String>(api::ARG_SESSION_DIR) {
        globals.session_dir = PathBuf::from(dir);
    }
    Ok(globals)
}

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches)?;

    match matches.subcommand() {
        Some((subcommands::CMD_RELAY, sub)) => Ok(Action::Relay(relay::Args {
            globals,
            port: sub
                .get_one::<u16>(subcommands::ARG_PORT)
                .copied()
                .unwrap_or(3000),
            cookie_secure: sub.get_flag(subcommands::ARG_COOKIE_SECURE),
        })),
        Some((subcommands::CMD_RECONCILE, sub)) => {
            let external_token = sub
                .get_one::<String>(subcommands::ARG_EXTERNAL_TOKEN)
                .map(|token| Token::new(token.as_str()))
                .context("missing required argument: --external-token")?;
            Ok(Action::Reconcile(reconcile::Args {
                globals,
                external_token,
                next: sub.get_one::<String>(subcommands::ARG_NEXT).cloned(),
            }))
        }
        Some((subcommands::CMD_SESSION, sub)) => {
            let command = match sub.subcommand_name() {
                Some(subcommands::CMD_SESSION_SHOW) => session::Command::Show,
                Some(subcommands::CMD_SESSION_CLEAR) => session::Command::Clear,
                other => bail!("unknown session command: {other:?}"),
            };
            Ok(Action::Session(session::Args { globals, command }))
        }
        Some((other, _)) => bail!("unknown command: {other}"),
        None => bail!("missing command"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn matches(args: &[&str]) -> clap::ArgMatches {
        commands::new().get_matches_from(args.iter().copied())
    }

    #[test]
    fn relay_action() {
        temp_env::with_vars([("RENTAUTH_API_BASE_URL", None::<&str>)], || {
            let action = handler(&matches(&[
                "rentauth",
                "--api-base-url",
                "https://api.example.com",
                "--relay-prefix",
                "bff/",
                "--timeout-ms",
                "2500",
                "relay",
                "--port",
                "4000",
            ]))
            .unwrap();

            let Action::Relay(args) = action else {
                panic!("expected relay action");
            };
            assert_eq!(args.port, 4000);
            assert!(!args.cookie_secure);
            assert_eq!(args.globals.relay_prefix, "/bff");
            assert_eq!(args.globals.timeout, Duration::from_millis(2500));
        });
    }

    #[test]
    fn reconcile_action() {
        temp_env::with_vars([("RENTAUTH_API_BASE_URL", Some("http://api.local"))], || {
            let action = handler(&matches(&[
                "rentauth",
                "--session-dir",
                "/tmp/rentauth",
                "reconcile",
                "--external-token",
                "EXT",
                "--next",
                "/reservations",
            ]))
            .unwrap();

            let Action::Reconcile(args) = action else {
                panic!("expected reconcile action");
            };
            assert_eq!(args.external_token, Token::from("EXT"));
            assert_eq!(args.next.as_deref(), Some("/reservations"));
            assert_eq!(args.globals.session_dir, PathBuf::from("/tmp/rentauth"));
            assert!(!format!("{args:?}").contains("EXT"));
        });
    }

    #[test]
    fn session_action() {
        temp_env::with_vars([("RENTAUTH_API_BASE_URL", Some("http://api.local"))], || {
            let action = handler(&matches(&["rentauth", "session", "show"])).unwrap();
            assert!(matches!(
                action,
                Action::Session(session::Args {
                    command: session::Command::Show,
                    ..
                })
            ));
        });
    }

    #[test]
    fn invalid_api_base_url_is_rejected() {
        temp_env::with_vars([("RENTAUTH_API_BASE_URL", Some("not a url"))], || {
            let err = handler(&matches(&["rentauth", "session", "show"])).unwrap_err();
            assert!(err.to_string().contains("Invalid API base URL"));
        });
    }
}
