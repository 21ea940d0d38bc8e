//! HTTP API and WebSocket interface for filebox.
//!
//! Endpoints:
//! - `POST /api/auth/login`
//! - `GET /api/files`, `DELETE /api/files?fileId=`
//! - `POST /api/files/upload`, `GET /api/files/:id`, `POST /api/files/zip`
//! - `GET /` (WebSocket upgrade, live file listing)
//! - `GET /health`

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
