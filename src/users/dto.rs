use serde::Serialize;

use crate::users::model::User;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub state: bool,
    pub message: &'static str,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserCreatedResponse {
    pub state: bool,
    pub message: &'static str,
    pub user: User,
}

/// Single-record envelope for show/update. The key is `users` even for one record.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub state: bool,
    pub message: &'static str,
    pub users: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub state: bool,
    pub message: &'static str,
}
