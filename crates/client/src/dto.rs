//! Authentication DTOs exchanged with the backend.

use serde::{Deserialize, Serialize};

use adminconsole_auth::{AuthenticatedIdentity, Credential, CredentialError, Grants, expiry_from_millis};
use adminconsole_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub user_name: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

/// User info embedded in the login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserId,
    pub user_name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl From<UserInfo> for AuthenticatedIdentity {
    fn from(info: UserInfo) -> Self {
        let display_name = if info.real_name.trim().is_empty() {
            info.user_name.clone()
        } else {
            info.real_name
        };
        AuthenticatedIdentity {
            user_id: info.id,
            user_name: info.user_name,
            display_name,
            email: info.email,
            avatar: info.avatar,
            grants: Grants::new(info.permissions, info.roles),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutput {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds; `0` means the backend sent no expiry.
    #[serde(default)]
    pub expired_time: i64,
    pub user_info: UserInfo,
}

impl LoginOutput {
    pub fn into_session(self) -> Result<(Credential, AuthenticatedIdentity), CredentialError> {
        let credential = Credential::new(
            self.access_token,
            self.refresh_token,
            expiry_from_millis(self.expired_time),
        )?;
        Ok((credential, self.user_info.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenInput {
    pub refresh_token: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenOutput {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expired_time: i64,
}

impl RefreshTokenOutput {
    pub fn into_credential(self) -> Result<Credential, CredentialError> {
        Credential::new(
            self.access_token,
            self.refresh_token,
            expiry_from_millis(self.expired_time),
        )
    }
}
