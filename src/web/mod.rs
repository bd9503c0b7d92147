//! HTTP API for Filedrop.
//!
//! Routes:
//! - `POST /upload` stores one multipart file, optionally in a subfolder
//! - `GET /files` and `GET /list-files` list every stored file
//! - `GET /files/*path` serves a stored file
//! - `GET /` and `GET /health`
//!
//! Anything else falls through to the static assets directory when enabled.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::{shutdown_signal, WebServer};
