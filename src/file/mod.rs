//! File management module for filebox.
//!
//! This module provides:
//! - File metadata records and the persisted metadata store
//! - Blob storage keyed by file ID
//! - Multipart upload parsing
//! - Upload ingestion, deletion and archive building

pub mod archive;
pub mod metadata;
pub mod multipart;
pub mod service;
pub mod storage;

pub use archive::build_archive;
pub use metadata::{FileRecord, FileSummary, MetadataStore};
pub use multipart::{FilePart, MultipartError};
pub use service::FileService;
pub use storage::BlobStorage;

/// Maximum length for a stored filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Generate a fresh file ID: 128 random bits, hex encoded.
pub fn generate_file_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Whether `id` has the shape of a generated file ID.
pub fn is_valid_file_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts (with either separator) and control characters are
/// dropped. Returns `None` when nothing usable remains.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let name: String = last
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_LENGTH)
        .collect();
    let name = name.trim();

    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}
