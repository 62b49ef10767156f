use clap::{Arg, Command};

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_RELAY_BASE_URL: &str = "relay-base-url";
pub const ARG_RELAY_PREFIX: &str = "relay-prefix";
pub const ARG_TIMEOUT_MS: &str = "timeout-ms";
pub const ARG_SESSION_DIR: &str = "session-dir";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("Internal authorization service base URL, example: https://api.example.com")
                .env("RENTAUTH_API_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_RELAY_BASE_URL)
                .long(ARG_RELAY_BASE_URL)
                .help("Origin serving the relay")
                .env("RENTAUTH_RELAY_BASE_URL")
                .global(true)
                .default_value(crate::api::client::DEFAULT_RELAY_BASE_URL),
        )
        .arg(
            Arg::new(ARG_RELAY_PREFIX)
                .long(ARG_RELAY_PREFIX)
                .help("Path prefix the relay answers under")
                .env("RENTAUTH_RELAY_PREFIX")
                .global(true)
                .default_value(crate::api::client::DEFAULT_RELAY_PREFIX),
        )
        .arg(
            Arg::new(ARG_TIMEOUT_MS)
                .long(ARG_TIMEOUT_MS)
                .help("Request timeout in milliseconds")
                .env("RENTAUTH_TIMEOUT_MS")
                .global(true)
                .default_value("12000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_DIR)
                .long(ARG_SESSION_DIR)
                .help("Directory holding the persisted session record")
                .env("RENTAUTH_SESSION_DIR")
                .global(true)
                .default_value("."),
        )
}
