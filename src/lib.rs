//! filebox - personal file storage service
//!
//! Authenticated users upload, list, download, delete and bulk-archive
//! files over HTTP. Every change is pushed to connected WebSocket
//! observers as a full listing snapshot.

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod file;
pub mod logging;
pub mod notify;
pub mod web;

pub use auth::{hash_password, verify_password, CredentialStore, PasswordError, TokenService};
pub use config::Config;
pub use error::{FileboxError, Result};
pub use file::{FileRecord, FileService, FileSummary};
pub use notify::{ChangeNotifier, Notification};
pub use web::WebServer;
