use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::{ApiClient, ApiEnvelope, ApiOrigin, HttpResult};
use crate::session::{RawUser, Role};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILE_PATH: &str = "/auth/profile";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";
pub const PASSWORD_RESET_PATH: &str = "/auth/request-password-reset";

/// Access/refresh pair issued by login and registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// `data` of a login or registration response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthPayload {
    pub user: Option<RawUser>,
    pub tokens: Option<TokenPair>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Fields of the profile a user may change; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }
}

/// Typed wrappers around the `/auth` endpoints of the primary API.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> HttpResult<ApiEnvelope<AuthPayload>> {
        self.client
            .post(
                ApiOrigin::Primary,
                LOGIN_PATH,
                json!({ "email": email, "password": password }),
            )
            .await?
            .json()
    }

    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> HttpResult<ApiEnvelope<AuthPayload>> {
        self.client
            .post(ApiOrigin::Primary, REGISTER_PATH, serde_json::to_value(request)?)
            .await?
            .json()
    }

    pub async fn logout(&self) -> HttpResult<ApiEnvelope<Value>> {
        self.client
            .post(ApiOrigin::Primary, LOGOUT_PATH, json!({}))
            .await?
            .json()
    }

    pub async fn profile(&self) -> HttpResult<ApiEnvelope<RawUser>> {
        self.client
            .get(ApiOrigin::Primary, PROFILE_PATH)
            .await?
            .json()
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> HttpResult<ApiEnvelope<Value>> {
        self.client
            .patch(ApiOrigin::Primary, PROFILE_PATH, serde_json::to_value(update)?)
            .await?
            .json()
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> HttpResult<ApiEnvelope<Value>> {
        self.client
            .post(
                ApiOrigin::Primary,
                CHANGE_PASSWORD_PATH,
                json!({ "currentPassword": current_password, "newPassword": new_password }),
            )
            .await?
            .json()
    }

    pub async fn request_password_reset(&self, email: &str) -> HttpResult<ApiEnvelope<Value>> {
        self.client
            .post(ApiOrigin::Primary, PASSWORD_RESET_PATH, json!({ "email": email }))
            .await?
            .json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn login_sends_credentials_and_parses_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(LOGIN_PATH)
                .json_body(json!({ "email": "a@b.com", "password": "pw" }));
            then.status(200).json_body_obj(&json!({
                "success": true,
                "data": {
                    "user": { "_id": "u1", "role": "student" },
                    "tokens": { "accessToken": "t1", "refreshToken": "r1" }
                }
            }));
        });

        let service = AuthService::new(harness(&server.base_url()).client);
        let envelope = service.login("a@b.com", "pw").await.unwrap();

        mock.assert();
        let data = envelope.data.unwrap();
        assert_eq!(data.user.unwrap().object_id.as_deref(), Some("u1"));
        assert_eq!(data.tokens.unwrap().access_token, "t1");
    }

    #[tokio::test]
    async fn profile_update_omits_untouched_fields() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::PATCH)
                .path(PROFILE_PATH)
                .json_body(json!({ "lastName": "Byron" }));
            then.status(200).json_body_obj(&json!({ "success": true }));
        });

        let service = AuthService::new(harness(&server.base_url()).client);
        let update = ProfileUpdate {
            last_name: Some("Byron".into()),
            ..ProfileUpdate::default()
        };
        let envelope = service.update_profile(&update).await.unwrap();

        mock.assert();
        assert!(envelope.success);
    }

    #[tokio::test]
    async fn register_serializes_camel_case() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(REGISTER_PATH).json_body(json!({
                "email": "new@b.com",
                "password": "Secret123!",
                "firstName": "New",
                "lastName": "Student",
                "role": "student"
            }));
            then.status(201).json_body_obj(&json!({
                "success": true,
                "data": { "user": { "id": "u9", "role": "student" } }
            }));
        });

        let service = AuthService::new(harness(&server.base_url()).client);
        let envelope = service
            .register(&RegisterRequest {
                email: "new@b.com".into(),
                password: "Secret123!".into(),
                first_name: "New".into(),
                last_name: "Student".into(),
                role: Role::Student,
            })
            .await
            .unwrap();

        mock.assert();
        assert!(envelope.data.unwrap().tokens.is_none());
    }
}
