//! Upload storage for Filedrop.
//!
//! This module owns everything under the upload root:
//! - Subfolder sanitizing and containment (`path`)
//! - Extension allow-list and size ceiling (`policy`)
//! - Stored filename generation (`naming`)
//! - The streaming upload pipeline (`intake`)
//! - Recursive listing (`listing`)
//! - Download resolution (`retrieval`)
//!
//! ```text
//! {root}/
//! ├── .incoming/          uploads still being written, never listed
//! ├── file-1718000000000000-42.png
//! └── reports/
//!     └── 2024/
//!         └── file-1718000000123456-7.pdf
//! ```

mod intake;
mod listing;
mod naming;
mod path;
mod policy;
mod retrieval;

use std::fs;
use std::path::{Path, PathBuf};

pub use intake::{
    BodyError, StagedUpload, StoredFile, UploadError, UploadIntake, UploadRequest, UploadState,
};
pub use listing::ListError;
pub use naming::generate as generate_name;
pub use path::{resolve as resolve_path, split_relative, PathError, TargetDir};
pub use policy::{extension_of, PolicyError, UploadPolicy, DEFAULT_MAX_UPLOAD_SIZE};
pub use retrieval::{ResolvedFile, RetrievalError};

use crate::Result;

/// Name of the staging directory directly under the root.
pub const STAGING_DIR: &str = ".incoming";

/// The upload root on disk.
#[derive(Debug, Clone)]
pub struct Storage {
    /// Canonical root directory.
    root: PathBuf,
    /// Canonical staging directory.
    staging: PathBuf,
}

impl Storage {
    /// Open the storage rooted at `root`.
    ///
    /// The root and its staging directory are created if missing, and leftovers
    /// from interrupted uploads are removed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(STAGING_DIR))?;

        let root = root.canonicalize()?;
        let staging = root.join(STAGING_DIR).canonicalize()?;

        let storage = Self { root, staging };
        storage.purge_staging();
        Ok(storage)
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory uploads are written to before being committed.
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Resolve `subfolder` under the root, creating missing directories.
    pub async fn ensure_dir(&self, subfolder: &str) -> std::result::Result<TargetDir, PathError> {
        path::ensure_dir(&self.root, subfolder).await
    }

    /// Every stored file, relative to the root, sorted.
    pub async fn list_all(&self) -> std::result::Result<Vec<String>, ListError> {
        listing::list_all(&self.root).await
    }

    /// Resolve a stored file for download.
    pub async fn resolve_file(
        &self,
        requested: &str,
    ) -> std::result::Result<ResolvedFile, RetrievalError> {
        retrieval::resolve(&self.root, requested).await
    }

    fn purge_staging(&self) {
        let Ok(entries) = fs::read_dir(&self.staging) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove stale staging file");
            } else {
                tracing::debug!(path = %path.display(), "Removed stale staging file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_root_and_staging() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("uploads");

        let storage = Storage::new(&root).unwrap();

        assert!(root.is_dir());
        assert!(root.join(STAGING_DIR).is_dir());
        assert_eq!(storage.root(), root.canonicalize().unwrap());
        assert_eq!(storage.staging_dir(), storage.root().join(STAGING_DIR));
    }

    #[test]
    fn test_new_accepts_existing_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("keep.txt"), b"x").unwrap();

        Storage::new(temp_dir.path()).unwrap();

        assert!(temp_dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_new_purges_stale_staging_files() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join(STAGING_DIR);
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("stale.partial"), b"half").unwrap();

        let storage = Storage::new(temp_dir.path()).unwrap();

        assert!(fs::read_dir(storage.staging_dir()).unwrap().next().is_none());
    }

    #[test]
    fn test_new_fails_when_root_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        assert!(Storage::new(&file).is_err());
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path()).unwrap();

        let target = storage.ensure_dir("a/b").await.unwrap();
        fs::write(target.path.join("x.txt"), b"hello").unwrap();

        assert_eq!(storage.list_all().await.unwrap(), vec!["a/b/x.txt"]);
        let file = storage.resolve_file("a/b/x.txt").await.unwrap();
        assert_eq!(file.size, 5);
    }
}
