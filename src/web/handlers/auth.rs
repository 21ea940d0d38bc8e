//! Authentication handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::{LoginRequest, LoginResponse, UserInfo, ValidatedJson};
use crate::web::error::ApiError;

/// POST /api/auth/login - Exchange credentials for a session token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Argon2 verification is CPU-bound
    let credentials = Arc::clone(&state.credentials);
    let username = req.username.clone();
    tokio::task::spawn_blocking(move || credentials.authenticate(&username, &req.password))
        .await
        .map_err(|e| {
            tracing::error!("Login task failed: {}", e);
            ApiError::internal("An internal error occurred")
        })?
        .map_err(|_| {
            tracing::info!(username = %req.username, "Login failed");
            ApiError::unauthorized("Invalid credentials")
        })?;

    let token = state.tokens.issue(&req.username);
    tracing::info!(username = %req.username, "User logged in");

    Ok(Json(LoginResponse {
        token,
        user: UserInfo {
            username: req.username,
        },
    }))
}
