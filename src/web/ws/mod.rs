//! WebSocket support for live file-listing updates.

pub mod files;

pub use files::file_updates_ws;
