//! Error types for filebox.

use thiserror::Error;

/// Common error type for filebox.
#[derive(Error, Debug)]
pub enum FileboxError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted JSON document could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing, invalid or expired session token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Login with an unknown username or a wrong password.
    ///
    /// Both cases produce this same error.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Malformed request body or missing required field.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// An upload would push stored bytes past the owner's quota.
    #[error("storage quota exceeded: {requested} bytes requested, {available} bytes available")]
    QuotaExceeded {
        /// Size of the rejected upload.
        requested: u64,
        /// Bytes still available under the quota.
        available: u64,
    },

    /// Archive requested while no files are stored.
    #[error("no files to archive")]
    NothingToArchive,

    /// Archive could not be assembled.
    #[error("archive failed: {0}")]
    ArchiveFailed(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for filebox operations.
pub type Result<T> = std::result::Result<T, FileboxError>;
