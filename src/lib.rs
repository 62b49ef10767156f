//! # rentauth (session reconciliation for the rental marketplace)
//!
//! `rentauth` bridges the external identity provider (signup, password, OAuth
//! and one-time-code logins) with the internal authorization service, which
//! issues its own role-scoped access and refresh tokens for every backend call.
//!
//! ## Layers
//!
//! - [`session`]: the session record, the token expiry hint and the stores.
//! - [`api`]: authenticated requests per execution context, with timeouts and a
//!   shared retry policy for `401` responses.
//! - [`auth`]: token reconciliation, the identity exchange and the single-flight
//!   reconcile-and-route flow run after every external login.
//! - [`relay`]: the same-origin proxy that keeps tokens in `HttpOnly` cookies so
//!   browser code never handles them.
//! - [`navigation`]: the seam through which flows move the user between pages.
//! - [`cli`]: the `rentauth` binary (relay server, one-shot reconcile, session
//!   inspection).
//!
//! ## Trust boundary
//!
//! Token claims are decoded client-side only to guess whether a refresh is
//! due. Signatures are never checked here; the internal authorization service
//! is the sole authority on whether a token is valid.

pub mod api;
pub mod auth;
pub mod cli;
pub mod navigation;
pub mod relay;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
