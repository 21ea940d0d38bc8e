//! Request DTOs for the HTTP API.

use serde::Deserialize;
use validator::Validate;

use super::validation::no_control_chars;

/// Login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username.
    #[validate(
        length(min = 1, message = "Username is required"),
        custom(function = "no_control_chars")
    )]
    pub username: String,
    /// Password. An empty one is checked like any other and fails with 401.
    pub password: String,
}

/// Query string for `DELETE /api/files`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteFileQuery {
    /// ID of the file to delete.
    #[serde(rename = "fileId")]
    pub file_id: Option<String>,
}

/// Query string for the WebSocket endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Session token, required only when the server demands one.
    pub token: Option<String>,
}
