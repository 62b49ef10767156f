//! Typed wrappers for the internal authorization service endpoints.
//!
//! These helpers keep the wire shapes in one place. Tokens go out only in
//! request bodies or the `Authorization` header and are never logged.

use super::{
    ApiClient, ApiError, RequestOptions, COMPLETE_PROFILE_PATH, LOGIN_PATH, ME_PATH,
    REFRESH_PATH, SWITCH_ROLE_PATH,
};
use crate::session::{Role, SessionTokens, Token};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server snapshot of the signed-in user.
///
/// Fields the layer does not interpret are kept in `extra` untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub has_profile_record: bool,
    #[serde(default)]
    pub has_vehicles: bool,
    #[serde(default)]
    pub kyc_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize, Deserialize)]
struct RoleBody {
    role: Role,
}

#[derive(Clone, Debug)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Exchange an external-provider token for a new internal token pair.
    ///
    /// # Errors
    ///
    /// Returns the request error unchanged.
    pub async fn login(&self, external_token: &Token) -> Result<SessionTokens, ApiError> {
        let body = LoginRequest {
            access_token: external_token.expose(),
        };
        let options = RequestOptions::method(Method::POST).json(&body)?;
        self.client.request(LOGIN_PATH, options).await
    }

    /// Trade a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Returns the request error unchanged.
    pub async fn refresh(&self, refresh_token: &Token) -> Result<SessionTokens, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.expose(),
        };
        let options = RequestOptions::method(Method::POST).json(&body)?;
        self.client.request(REFRESH_PATH, options).await
    }

    /// Fetch the current profile. Never cached.
    ///
    /// # Errors
    ///
    /// Returns the request error unchanged.
    pub async fn me(&self, access_token: &Token) -> Result<Profile, ApiError> {
        let options = RequestOptions::get().bearer(access_token.clone());
        self.client.request(ME_PATH, options).await
    }

    /// Ask the server to activate `role`; returns the role it settled on.
    ///
    /// # Errors
    ///
    /// Returns the request error unchanged.
    pub async fn switch_role(&self, access_token: &Token, role: Role) -> Result<Role, ApiError> {
        let options = RequestOptions::method(Method::PATCH)
            .json(&RoleBody { role })?
            .bearer(access_token.clone());
        let response: RoleBody = self.client.request(SWITCH_ROLE_PATH, options).await?;
        Ok(response.role)
    }

    /// Submit profile fields and return the updated profile.
    ///
    /// # Errors
    ///
    /// Returns the request error unchanged; validation failures keep the
    /// server body in [`ApiError::details`].
    pub async fn complete_profile(
        &self,
        access_token: &Token,
        fields: &Value,
    ) -> Result<Profile, ApiError> {
        let options = RequestOptions::method(Method::POST)
            .json(fields)?
            .bearer(access_token.clone());
        self.client.request(COMPLETE_PROFILE_PATH, options).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn service(uri: String) -> AuthService {
        AuthService::new(ApiClient::server(ApiConfig::new(uri)).unwrap())
    }

    #[test]
    fn profile_keeps_unknown_fields() {
        let profile: Profile = serde_json::from_value(json!({
            "role": "PROPRIETAIRE",
            "hasProfileRecord": true,
            "hasVehicles": false,
            "kycStatus": "PENDING",
            "firstName": "Awa"
        }))
        .unwrap();

        assert_eq!(profile.role, Some(Role::Proprietaire));
        assert!(profile.has_profile_record);
        assert_eq!(profile.kyc_status.as_deref(), Some("PENDING"));
        assert_eq!(profile.extra.get("firstName"), Some(&json!("Awa")));
    }

    #[tokio::test]
    async fn login_posts_external_token() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "accessToken": "EXT" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "A1",
                "refreshToken": "R1",
                "activeRole": "LOCATAIRE"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = service(server.uri())
            .login(&Token::from("EXT"))
            .await
            .unwrap();
        assert_eq!(tokens.access_token, Token::from("A1"));
        assert_eq!(tokens.active_role, Some(Role::Locataire));
    }

    #[tokio::test]
    async fn switch_role_patches_with_bearer() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/auth/switch-role"))
            .and(header("authorization", "Bearer A1"))
            .and(body_json(json!({ "role": "PROPRIETAIRE" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "role": "PROPRIETAIRE" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let role = service(server.uri())
            .switch_role(&Token::from("A1"), Role::Proprietaire)
            .await
            .unwrap();
        assert_eq!(role, Role::Proprietaire);
    }
}
