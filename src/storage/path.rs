//! Path sanitizing for the storage root.
//!
//! Every path that reaches the filesystem is built here from a
//! user-supplied relative string. Segments are checked lexically first
//! (no absolute paths, no `..`, no NUL or backslash), then each resolved
//! directory is canonicalized and must remain inside the canonical root.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::STAGING_DIR;

/// Path sanitizing errors.
#[derive(Error, Debug)]
pub enum PathError {
    /// The path resolves outside the storage root.
    #[error("path escapes the storage root")]
    Escape,

    /// The path contains a character that is never accepted.
    #[error("path contains an invalid character: {0:?}")]
    InvalidCharacter(char),

    /// The path names an internal directory.
    #[error("path segment is reserved: {0}")]
    Reserved(String),

    /// A filename is empty or contains directory components.
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    /// A path segment exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Filesystem failure while resolving the path.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PathError {
    /// Whether this error was caused by the request rather than the filesystem.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PathError::Io(_))
    }
}

/// A directory below the storage root, created and verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDir {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Normalized relative path from the root (`/`-separated, empty for the root).
    pub relative: String,
}

/// Split a user-supplied relative path into its normal segments.
///
/// Empty segments and `.` are dropped. Absolute paths and `..` segments
/// are rejected with [`PathError::Escape`].
pub fn split_relative(input: &str) -> Result<Vec<&str>, PathError> {
    if let Some(c) = input
        .chars()
        .find(|c| *c == '\0' || *c == '\\' || *c == ':' || c.is_control())
    {
        return Err(PathError::InvalidCharacter(c));
    }

    if input.starts_with('/') {
        return Err(PathError::Escape);
    }

    let mut segments = Vec::new();
    for segment in input.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::Escape),
            s => segments.push(s),
        }
    }

    if segments.first() == Some(&STAGING_DIR) {
        return Err(PathError::Reserved(STAGING_DIR.to_string()));
    }

    Ok(segments)
}

/// Resolve `subfolder` below `root`, creating missing directories.
///
/// `root` must already be canonical. Directories are created one segment at
/// a time and each one is verified to stay inside `root` before descending,
/// so a symlink pointing elsewhere never gets anything created behind it.
/// Concurrent creation of the same directory is not an error.
pub async fn ensure_dir(root: &Path, subfolder: &str) -> Result<TargetDir, PathError> {
    let segments = split_relative(subfolder)?;
    let mut current = root.to_path_buf();

    for segment in &segments {
        let next = current.join(segment);

        match tokio::fs::create_dir(&next).await {
            Ok(()) => {
                tracing::debug!(path = %next.display(), "Created upload directory");
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let canonical = tokio::fs::canonicalize(&next).await?;
        if !canonical.starts_with(root) {
            tracing::warn!(subfolder, "Subfolder resolves outside the storage root");
            return Err(PathError::Escape);
        }
        if !tokio::fs::metadata(&canonical).await?.is_dir() {
            return Err(PathError::NotADirectory(segments.join("/")));
        }

        current = canonical;
    }

    Ok(TargetDir {
        path: current,
        relative: segments.join("/"),
    })
}

/// Resolve `subfolder` and `filename` to an absolute path below `root`.
///
/// The directory part is created if needed; the file itself is not touched.
pub async fn resolve(root: &Path, subfolder: &str, filename: &str) -> Result<PathBuf, PathError> {
    let segments = split_relative(filename)?;
    let [name] = segments.as_slice() else {
        return Err(PathError::InvalidFilename(filename.to_string()));
    };

    let dir = ensure_dir(root, subfolder).await?;
    Ok(dir.path.join(name))
}

/// Resolve an existing path below `root` without creating anything.
///
/// Symlinks are followed, but the canonical target must stay inside `root`.
pub async fn contain(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let segments = split_relative(relative)?;
    let joined = segments
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    let canonical = tokio::fs::canonicalize(&joined).await?;
    if !canonical.starts_with(root) {
        return Err(PathError::Escape);
    }

    Ok(canonical)
}
