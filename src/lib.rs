//! Filedrop - HTTP file upload service
//!
//! Accepts multipart uploads into a storage root, optionally under nested
//! subfolders, and serves them back with recursive listing and download.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod web;

pub use config::Config;
pub use error::{FiledropError, Result};
pub use storage::{
    Storage, StoredFile, UploadError, UploadIntake, UploadPolicy, UploadRequest, UploadState,
};
pub use web::WebServer;
