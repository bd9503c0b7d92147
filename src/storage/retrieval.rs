//! Resolution of stored files for download.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::path::{contain, PathError};

/// Retrieval errors.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Nothing servable exists at the requested path.
    #[error("file not found")]
    NotFound,

    /// The requested path resolves outside the storage root.
    #[error("path escapes the storage root")]
    Escape,

    /// The file exists but could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A stored file resolved for reading.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Content type inferred from the extension.
    pub content_type: String,
}

impl ResolvedFile {
    /// The final path component, used for `Content-Disposition`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the whole file.
    pub async fn read(&self) -> Result<Vec<u8>, RetrievalError> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RetrievalError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolve `requested` (relative to `root`) to a regular file inside `root`.
pub async fn resolve(root: &Path, requested: &str) -> Result<ResolvedFile, RetrievalError> {
    let path = contain(root, requested).await.map_err(|e| match e {
        PathError::Escape => RetrievalError::Escape,
        _ => RetrievalError::NotFound,
    })?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| RetrievalError::NotFound)?;
    if !metadata.is_file() {
        return Err(RetrievalError::NotFound);
    }

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    Ok(ResolvedFile {
        path,
        size: metadata.len(),
        content_type,
    })
}
