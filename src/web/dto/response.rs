//! Response DTOs for the HTTP API.

use serde::Serialize;

use crate::storage::StoredFile;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Stored filename, used to retrieve the file later.
    pub filename: String,
    /// Subfolder the file was stored in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
    /// Path relative to the upload root, as accepted by `GET /files/*path`.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

impl From<StoredFile> for UploadResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            filename: file.filename,
            subfolder: file.subfolder,
            path: file.relative_path,
            size: file.size,
        }
    }
}
