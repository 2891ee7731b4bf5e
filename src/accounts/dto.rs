use serde::{Deserialize, Serialize};

use super::repo_types::{PublicUser, User};

/// Request body for registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for a password change.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Record echoed back to the client; the hash is present only when the
/// response policy allows it.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Stored(User),
    Public(PublicUser),
}

impl UserView {
    pub fn new(user: User, expose_hash: bool) -> Self {
        if expose_hash {
            Self::Stored(user)
        } else {
            Self::Public(user.into())
        }
    }
}

/// Every response carries `msg`; the rest depends on the operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl MessageResponse {
    pub fn msg(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            token: None,
            user: None,
            avatar_url: None,
        }
    }

    pub fn with_user(mut self, user: UserView) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_avatar_url(mut self, url: String) -> Self {
        self.avatar_url = Some(url);
        self
    }
}
