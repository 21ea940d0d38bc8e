//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::AUTHORIZATION;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use filebox::config::Config;
use filebox::web::handlers::AppState;
use filebox::web::router::create_router;

/// Signing secret used by every test server.
pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "----filebox-test-boundary";

/// A router under test plus the state and directory behind it.
pub struct TestApp {
    /// In-process test server.
    pub server: TestServer,
    /// Shared application state.
    pub state: Arc<AppState>,
    /// Configuration the app was opened with.
    pub config: Config,
    /// Keeps the data directories alive.
    pub dir: TempDir,
}

/// Create a configuration rooted in `dir`.
pub fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.storage.data_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.storage.upload_dir = dir.path().join("uploads").to_string_lossy().into_owned();
    config.auth.token_secret = TEST_SECRET.to_string();
    config.logging.file = String::new();
    config
}

/// Create a test app with default settings.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(|_| {}).await
}

/// Create a test app after adjusting its configuration.
pub async fn create_test_app_with(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = create_test_config(&dir);
    adjust(&mut config);

    let state = Arc::new(
        AppState::open(&config)
            .await
            .expect("Failed to open app state"),
    );
    let router = create_router(
        Arc::clone(&state),
        &config.server,
        config.storage.max_upload_bytes(),
    );
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        config,
        dir,
    }
}

/// Log in with the seeded account and return the token.
pub async fn login(server: &TestServer) -> String {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "username": "admin", "password": "admin" }))
        .await;
    response.assert_status_ok();

    response.json::<Value>()["token"]
        .as_str()
        .expect("token in login response")
        .to_string()
}

/// Build a multipart/form-data body with a single `file` part.
pub fn multipart_body(filename: &str, content: &[u8]) -> Bytes {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Bytes::from(body)
}

/// Content-Type header value matching [`multipart_body`].
pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Upload a file and return the raw response.
pub async fn upload(server: &TestServer, token: &str, filename: &str, content: &[u8]) -> TestResponse {
    server
        .post("/api/files/upload")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .content_type(&multipart_content_type())
        .bytes(multipart_body(filename, content))
        .await
}

/// Upload a file, assert success and return its ID.
pub async fn upload_ok(server: &TestServer, token: &str, filename: &str, content: &[u8]) -> String {
    let response = upload(server, token, filename, content).await;
    response.assert_status_ok();
    response.json::<Value>()["fileId"]
        .as_str()
        .expect("fileId in upload response")
        .to_string()
}

/// List files and return the JSON array.
pub async fn list(server: &TestServer, token: &str) -> Vec<Value> {
    let response = server
        .get("/api/files")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .await;
    response.assert_status_ok();
    response
        .json::<Value>()
        .as_array()
        .expect("listing is an array")
        .clone()
}
