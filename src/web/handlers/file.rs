//! File handlers.

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::file::multipart::{boundary_from_content_type, parse_file};
use crate::file::FileSummary;
use crate::web::dto::{DeleteFileQuery, MessageResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// Build a Content-Disposition header value with proper encoding.
///
/// Non-ASCII names get an RFC 5987 `filename*` parameter alongside a
/// sanitized ASCII-safe `filename`.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = sanitized
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let encoded = urlencoding::encode(filename);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

fn binary_response(content_type: &str, disposition: String, content: Vec<u8>) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, disposition)
        .header(CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("An internal error occurred")
        })
}

/// GET /api/files - List all stored files.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    _claims: AuthUser,
) -> Json<Vec<FileSummary>> {
    let files = state.files.list().iter().map(FileSummary::from).collect();
    Json(files)
}

/// POST /api/files/upload - Upload a file (multipart/form-data).
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    claims: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;

    let boundary = boundary_from_content_type(content_type)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let file = parse_file(&body, &boundary).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let record = state
        .files
        .upload(claims.username(), &file.file_name, file.data)
        .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file_id: record.id,
        name: record.name,
    }))
}

/// GET /api/files/:id - Download a file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    _claims: AuthUser,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let (record, content) = state.files.read(&file_id)?;

    binary_response(
        "application/octet-stream",
        content_disposition_header(&record.name),
        content,
    )
}

/// DELETE /api/files?fileId=<id> - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    _claims: AuthUser,
    Query(query): Query<DeleteFileQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let file_id = query
        .file_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("File ID is required"))?;

    state.files.delete(&file_id).await?;

    Ok(Json(MessageResponse::new("File deleted successfully")))
}

/// POST /api/files/zip - Download every stored file as one zip archive.
pub async fn archive_files(
    State(state): State<Arc<AppState>>,
    _claims: AuthUser,
) -> Result<Response, ApiError> {
    let archive = state.files.archive().await?;

    binary_response(
        "application/zip",
        content_disposition_header("files.zip"),
        archive,
    )
}
