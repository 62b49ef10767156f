//! Requests to the internal authorization service and the rest of the
//! backend, in either execution context.

pub mod auth_fetch;
pub mod auth_service;
pub mod client;
pub mod error;
pub mod retry;

pub use auth_fetch::AuthFetch;
pub use auth_service::{AuthService, Profile};
pub use client::{ApiClient, ApiConfig, ExecutionContext, RequestOptions};
pub use error::ApiError;
pub use retry::{Backoff, RetryPolicy};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const ME_PATH: &str = "/auth/me";
pub const SWITCH_ROLE_PATH: &str = "/auth/switch-role";
pub const COMPLETE_PROFILE_PATH: &str = "/auth/complete-profile";
