//! Recursive listing of stored files.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::STAGING_DIR;

/// Listing errors.
#[derive(Error, Debug)]
pub enum ListError {
    /// A directory could not be read.
    #[error("failed to read directory {path}: {source}")]
    Unreadable {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// List every regular file under `root`, at any depth.
///
/// Paths are relative to `root`, joined with `/` and sorted. Directories are
/// not listed themselves, symbolic links are neither listed nor followed, and
/// the staging directory is skipped. Any unreadable directory fails the whole
/// listing rather than returning a partial result.
///
/// Entries whose names are not valid UTF-8 are left out, since a lossy name
/// could not be retrieved again. Uploads never create such names.
pub async fn list_all(root: &Path) -> Result<Vec<String>, ListError> {
    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let unreadable = |source| ListError::Unreadable {
            path: dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(unreadable)?;

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 entry");
                continue;
            };
            if prefix.is_empty() && name == STAGING_DIR {
                continue;
            }

            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };

            let file_type = entry.file_type().await.map_err(unreadable)?;
            if file_type.is_dir() {
                pending.push((entry.path(), relative));
            } else if file_type.is_file() {
                files.push(relative);
            }
        }
    }

    files.sort();
    Ok(files)
}
