use serde_json::Value;
use thiserror::Error;

/// Maximum number of error body characters carried in an error message.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Clone, Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response; `details` holds the parsed body.
    #[error("Request failed ({status}): {message}")]
    Http {
        status: u16,
        message: String,
        details: Value,
    },
    #[error("Response error: {0}")]
    Decode(String),
    #[error("Config error: {0}")]
    Config(String),
    /// Authorization retries ran out and the sign-in navigation was forced.
    #[error("Session expired")]
    SessionExpired,
    /// A protected call was attempted before the session was reconciled.
    #[error("No reconciled session")]
    NotReconciled,
}

impl ApiError {
    /// Build an HTTP error from a status and the parsed response body.
    #[must_use]
    pub fn http(status: u16, details: Value) -> Self {
        let message = error_message(status, &details);
        ApiError::Http {
            status,
            message,
            details,
        }
    }

    /// HTTP-equivalent status, when one applies.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Timeout => Some(408),
            ApiError::SessionExpired | ApiError::NotReconciled => Some(401),
            ApiError::Network(_) | ApiError::Decode(_) | ApiError::Config(_) => None,
        }
    }

    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        match self {
            ApiError::Http { details, .. } => Some(details),
            _ => None,
        }
    }

    /// A `401` from the server, the only error the authorization retry loop
    /// acts on.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }
}

fn error_message(status: u16, details: &Value) -> String {
    let from_body = match details {
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(text) => Some(text.clone()),
        _ => None,
    };

    match from_body.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.chars().take(MAX_ERROR_CHARS).collect(),
        _ => reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Request failed.")
            .to_string(),
    }
}
