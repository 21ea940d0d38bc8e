//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    archive_files, delete_file, download_file, list_files, login, upload_file, AppState,
};
use super::middleware::{create_cors_layer, token_auth};
use super::ws::file_updates_ws;
use crate::config::ServerConfig;

/// Room for the multipart envelope on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main router.
///
/// `max_upload_bytes` caps the size of an uploaded file.
pub fn create_router(
    app_state: Arc<AppState>,
    server: &ServerConfig,
    max_upload_bytes: usize,
) -> Router {
    let upload_limit = max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    // Auth routes (no authentication required)
    let auth_routes = Router::new().route("/login", post(login));

    // File routes (authentication enforced by the AuthUser extractor)
    let file_routes = Router::new()
        .route("/files", get(list_files).delete(delete_file))
        .route(
            "/files/upload",
            post(upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/zip", post(archive_files))
        .route("/files/:id", get(download_file));

    let api_routes = Router::new().nest("/auth", auth_routes).merge(file_routes);

    let tokens = Arc::clone(&app_state.tokens);

    Router::new()
        .route("/", get(file_updates_ws))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&server.cors_origins))
                .layer(middleware::from_fn(move |req, next| {
                    let tokens = Arc::clone(&tokens);
                    token_auth(tokens, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
