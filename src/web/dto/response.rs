//! Response DTOs for the HTTP API.

use serde::Serialize;

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Session token.
    pub token: String,
    /// Authenticated user.
    pub user: UserInfo,
}

/// Minimal user information.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    /// Username.
    pub username: String,
}

/// Upload response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Status message.
    pub message: String,
    /// ID of the stored file.
    pub file_id: String,
    /// Stored display name.
    pub name: String,
}

/// Simple message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Status message.
    pub message: String,
}

impl MessageResponse {
    /// Create a new message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
