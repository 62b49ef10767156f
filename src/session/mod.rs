//! Session record shared by every component, plus the token expiry hint and
//! the stores that persist the record.
//!
//! Raw token material only lives inside [`Token`], which redacts itself in
//! `Debug` output. Callers expose the value at the point of use (a header, a
//! cookie or a request body) and nowhere else.

pub mod store;
pub mod token;

pub use store::{FileStore, MemoryStore, SessionStore, STORAGE_KEY};
pub use token::{decode, is_likely_expired, is_likely_expired_at, TokenClaims, EXPIRY_SKEW_SECONDS};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Opaque bearer credential issued by the internal authorization service or
/// the external identity provider.
#[derive(Clone)]
pub struct Token(SecretString);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Raw token value. Keep the result out of logs.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Token {}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Capability set active for the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    /// Vehicle owner.
    Proprietaire,
    /// Renter.
    Locataire,
    #[serde(other)]
    Unknown,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Proprietaire => "PROPRIETAIRE",
            Role::Locataire => "LOCATAIRE",
            Role::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "PROPRIETAIRE" | "OWNER" => Ok(Role::Proprietaire),
            "LOCATAIRE" | "RENTER" => Ok(Role::Locataire),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Token pair returned by the login exchange and by refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: Token,
    pub refresh_token: Token,
    #[serde(default)]
    pub active_role: Option<Role>,
}

/// The persisted internal session.
///
/// Writes always go through [`SessionStore`], which only accepts complete
/// [`SessionTokens`], so a written record holds both tokens or neither.
/// Records loaded from disk are taken as found; the reconciler deals with a
/// record that lost its refresh token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<Token>,
    #[serde(default)]
    pub refresh_token: Option<Token>,
    #[serde(default)]
    pub active_role: Option<Role>,
}

impl Session {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.active_role.is_none()
    }

    /// Active role, only when an access token backs it.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.access_token.as_ref().and(self.active_role)
    }
}

impl From<SessionTokens> for Session {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            active_role: tokens.active_role,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::from("super-secret");
        assert_eq!(format!("{token:?}"), "Token(***)");
        assert_eq!(token.expose(), "super-secret");
    }

    #[test]
    fn session_tokens_use_camel_case() {
        let tokens: SessionTokens = serde_json::from_value(json!({
            "accessToken": "A2",
            "refreshToken": "R2",
            "activeRole": "LOCATAIRE"
        }))
        .unwrap();

        assert_eq!(tokens.access_token, Token::from("A2"));
        assert_eq!(tokens.refresh_token, Token::from("R2"));
        assert_eq!(tokens.active_role, Some(Role::Locataire));
    }

    #[test]
    fn unknown_roles_are_tolerated() {
        let tokens: SessionTokens = serde_json::from_value(json!({
            "accessToken": "A",
            "refreshToken": "R",
            "activeRole": "MODERATOR"
        }))
        .unwrap();
        assert_eq!(tokens.active_role, Some(Role::Unknown));
    }

    #[test]
    fn role_without_access_token_is_ignored() {
        let session = Session {
            access_token: None,
            refresh_token: None,
            active_role: Some(Role::Admin),
        };
        assert_eq!(session.role(), None);
    }

    #[test]
    fn role_from_str_accepts_aliases() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Proprietaire));
        assert_eq!("locataire".parse::<Role>(), Ok(Role::Locataire));
        assert!("root".parse::<Role>().is_err());
    }
}
