//! Upload policy: extension allow-list and size ceiling.

use std::collections::BTreeSet;

use thiserror::Error;

/// Default maximum upload size (5MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024;

/// Policy violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The file extension is not in the allow-list.
    #[error("file type not allowed: {extension:?}")]
    ExtensionRejected {
        /// Normalized extension of the rejected file.
        extension: String,
    },

    /// The file is larger than the configured ceiling.
    #[error("file exceeds the maximum upload size of {limit} bytes")]
    SizeExceeded {
        /// Bytes seen when the ceiling was crossed.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },
}

/// Read-only upload policy, built once at startup.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: BTreeSet<String>,
    max_size: u64,
}

impl UploadPolicy {
    /// Create a policy from an extension list and a size ceiling in bytes.
    ///
    /// Extensions are trimmed, lower-cased and stripped of a leading dot.
    /// An explicit empty string allows files without an extension.
    pub fn new<I, S>(extensions: I, max_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .collect();

        Self {
            allowed_extensions,
            max_size,
        }
    }

    /// Create a policy from a comma-separated list such as `"png,pdf,JPG"`.
    ///
    /// Empty entries are ignored, so an empty string yields a policy that
    /// rejects every upload.
    pub fn from_list(list: &str, max_size: u64) -> Self {
        Self::new(
            list.split(',').map(str::trim).filter(|ext| !ext.is_empty()),
            max_size,
        )
    }

    /// The size ceiling in bytes.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Allowed extensions in sorted order.
    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    /// Whether the allow-list is empty (every upload is rejected).
    pub fn is_empty(&self) -> bool {
        self.allowed_extensions.is_empty()
    }

    /// Check the extension of `filename` against the allow-list.
    ///
    /// Returns the normalized extension on success.
    pub fn check_extension(&self, filename: &str) -> Result<String, PolicyError> {
        let extension = extension_of(filename);
        if self.allowed_extensions.contains(&extension) {
            Ok(extension)
        } else {
            Err(PolicyError::ExtensionRejected { extension })
        }
    }

    /// Check a byte count against the size ceiling.
    pub fn check_size(&self, size: u64) -> Result<(), PolicyError> {
        if size > self.max_size {
            Err(PolicyError::SizeExceeded {
                size,
                limit: self.max_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a candidate upload before any of its bytes are stored.
    ///
    /// `declared_size` is checked when the transport knows it up front; the
    /// streamed byte count is checked again while writing.
    pub fn validate(&self, filename: &str, declared_size: Option<u64>) -> Result<String, PolicyError> {
        let extension = self.check_extension(filename)?;
        if let Some(size) = declared_size {
            self.check_size(size)?;
        }
        Ok(extension)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Extract the normalized extension of a client-supplied filename.
///
/// Only the last path component is considered. The extension is the text
/// after the last `.`, lower-cased; dotfiles such as `.bashrc` and names
/// ending in a dot have no extension.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}
