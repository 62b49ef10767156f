use clap::{Arg, ArgAction, Command};

pub const CMD_RELAY: &str = "relay";
pub const CMD_RECONCILE: &str = "reconcile";
pub const CMD_SESSION: &str = "session";
pub const CMD_SESSION_SHOW: &str = "show";
pub const CMD_SESSION_CLEAR: &str = "clear";

pub const ARG_PORT: &str = "port";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_EXTERNAL_TOKEN: &str = "external-token";
pub const ARG_NEXT: &str = "next";

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new(CMD_RELAY)
                .about("Run the same-origin relay")
                .arg(
                    Arg::new(ARG_PORT)
                        .short('p')
                        .long(ARG_PORT)
                        .help("Port to listen on")
                        .default_value("3000")
                        .env("RENTAUTH_PORT")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new(ARG_COOKIE_SECURE)
                        .long(ARG_COOKIE_SECURE)
                        .help("Mark token cookies Secure (serve over HTTPS)")
                        .env("RENTAUTH_COOKIE_SECURE")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new(CMD_RECONCILE)
                .about("Reconcile the stored session with an external token and print the destination")
                .arg(
                    Arg::new(ARG_EXTERNAL_TOKEN)
                        .long(ARG_EXTERNAL_TOKEN)
                        .help("Access token issued by the external identity provider")
                        .env("RENTAUTH_EXTERNAL_TOKEN")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_NEXT)
                        .long(ARG_NEXT)
                        .help("Page originally requested, honored for renters only"),
                ),
        )
        .subcommand(
            Command::new(CMD_SESSION)
                .about("Inspect or clear the stored session")
                .subcommand_required(true)
                .subcommand(Command::new(CMD_SESSION_SHOW).about("Show the stored session"))
                .subcommand(Command::new(CMD_SESSION_CLEAR).about("Clear the stored session")),
        )
}
