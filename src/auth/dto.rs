use serde::Serialize;

use crate::users::model::User;

/// Token block returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct Authorization {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
}

impl Authorization {
    pub fn bearer(token: String) -> Self {
        Self {
            token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub user: User,
    pub authorization: Authorization,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: bool,
    pub message: &'static str,
    pub user: User,
    pub authorization: Authorization,
}

/// `"success"` when the token was revoked, `false` when revocation failed.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum LogoutStatus {
    Done(&'static str),
    Failed(bool),
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub status: LogoutStatus,
    pub message: String,
}

impl LogoutResponse {
    pub fn done() -> Self {
        Self {
            status: LogoutStatus::Done("success"),
            message: "Successfully logged out".into(),
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            status: LogoutStatus::Failed(false),
            message,
        }
    }
}
