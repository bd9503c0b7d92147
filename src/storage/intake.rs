//! Upload intake pipeline.
//!
//! An upload moves through
//! `Receiving -> Validating -> Writing -> Committed | Rejected | Failed`.
//!
//! The body is streamed into a uniquely named file inside the staging
//! directory. Only a fully written, synced file is linked into its target
//! directory, and the staging file is removed whatever happens, so a
//! rejected, failed or abandoned upload never leaves anything visible to
//! listing or retrieval.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use uuid::Uuid;

use super::naming;
use super::path::{PathError, TargetDir};
use super::policy::{PolicyError, UploadPolicy};
use super::Storage;

/// Attempts at finding a free stored name before giving up.
const MAX_COMMIT_ATTEMPTS: usize = 5;

/// Suffix of files in the staging directory.
const STAGING_SUFFIX: &str = "partial";

/// Upload lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Multipart fields are being parsed.
    Receiving,
    /// Policy and subfolder are being checked.
    Validating,
    /// Body bytes are being written to staging.
    Writing,
    /// The file is stored and visible.
    Committed,
    /// The request was refused; nothing was stored.
    Rejected,
    /// Storing failed; nothing was stored.
    Failed,
}

impl UploadState {
    /// Whether the state ends the upload.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadState::Committed | UploadState::Rejected | UploadState::Failed
        )
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Receiving => "receiving",
            UploadState::Validating => "validating",
            UploadState::Writing => "writing",
            UploadState::Committed => "committed",
            UploadState::Rejected => "rejected",
            UploadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Failure reported by the transport while an upload body is streamed.
#[derive(Error, Debug)]
pub enum BodyError {
    /// The transport refused more bytes.
    #[error("request body exceeds the transport limit")]
    TooLarge,

    /// The body ended abnormally, e.g. the client disconnected.
    #[error("{0}")]
    Broken(String),
}

/// Upload errors.
#[derive(Error, Debug)]
pub enum UploadError {
    /// No `file` part was present.
    #[error("no file was uploaded")]
    MissingFile,

    /// More than one `file` part was present.
    #[error("only one file may be uploaded per request")]
    MultipleFiles,

    /// The upload violates the policy.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The subfolder could not be resolved.
    #[error("invalid subfolder: {0}")]
    Path(#[from] PathError),

    /// The body ended before it was complete.
    #[error("upload interrupted: {0}")]
    Interrupted(String),

    /// No progress was made within the I/O timeout.
    #[error("upload timed out")]
    TimedOut,

    /// The filesystem failed while storing the upload.
    #[error("storage error: {0}")]
    Disk(#[from] io::Error),
}

impl UploadError {
    /// The terminal state this error puts the upload in.
    pub fn state(&self) -> UploadState {
        match self {
            UploadError::MissingFile | UploadError::MultipleFiles | UploadError::Policy(_) => {
                UploadState::Rejected
            }
            UploadError::Path(e) if e.is_client_error() => UploadState::Rejected,
            _ => UploadState::Failed,
        }
    }
}

/// One incoming file, as handed over by the transport.
pub struct UploadRequest<S> {
    /// Form field the file was sent in.
    pub field_name: String,
    /// Client-supplied filename.
    pub original_name: String,
    /// Requested subfolder, if known when the request is built.
    pub subfolder: Option<String>,
    /// Body length announced by the client, if any.
    pub declared_size: Option<u64>,
    /// The body.
    pub body: S,
}

/// A committed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated filename.
    pub filename: String,
    /// Normalized subfolder, `None` when stored at the root.
    pub subfolder: Option<String>,
    /// Path relative to the storage root, `/`-separated.
    pub relative_path: String,
    /// Size in bytes.
    pub size: u64,
    /// Normalized extension.
    pub extension: String,
}

/// The upload pipeline.
#[derive(Debug, Clone)]
pub struct UploadIntake {
    storage: Storage,
    policy: UploadPolicy,
    io_timeout: Duration,
}

impl UploadIntake {
    /// Create a pipeline over `storage` enforcing `policy`.
    ///
    /// `io_timeout` bounds every single body read and disk write.
    pub fn new(storage: Storage, policy: UploadPolicy, io_timeout: Duration) -> Self {
        Self {
            storage,
            policy,
            io_timeout,
        }
    }

    /// The storage this pipeline writes to.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The enforced policy.
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Longest wait for a single read or write.
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Resolve and create the target directory for `subfolder`.
    pub async fn prepare_target(&self, subfolder: &str) -> Result<TargetDir, UploadError> {
        self.storage.ensure_dir(subfolder).await.map_err(|e| {
            tracing::warn!(subfolder, error = %e, "Rejected upload subfolder");
            UploadError::from(e)
        })
    }

    /// Validate an incoming file and stream its body into staging.
    ///
    /// The extension and any declared size are checked before the staging
    /// file is created. The streamed byte count is checked chunk by chunk.
    pub async fn receive<S, B, E>(
        &self,
        field_name: &str,
        original_name: &str,
        declared_size: Option<u64>,
        body: S,
    ) -> Result<StagedUpload, UploadError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<BodyError>,
    {
        let upload_id = Uuid::new_v4();
        tracing::debug!(%upload_id, state = %UploadState::Validating, file = original_name, "Upload state changed");

        let extension = self
            .policy
            .validate(original_name, declared_size)
            .inspect_err(|e| {
                tracing::warn!(%upload_id, file = original_name, error = %e, "Upload rejected by policy");
            })?;

        let staging_path = self
            .storage
            .staging_dir()
            .join(format!("{upload_id}.{STAGING_SUFFIX}"));
        let (staging, mut file) = StagingFile::create(staging_path).await?;

        tracing::debug!(%upload_id, state = %UploadState::Writing, "Upload state changed");
        let size = self.write_body(body, &mut file).await.inspect_err(|e| {
            tracing::warn!(%upload_id, state = %e.state(), error = %e, "Upload aborted while writing");
        })?;
        drop(file);

        Ok(StagedUpload {
            upload_id,
            staging,
            field_name: field_name.to_string(),
            extension,
            size,
        })
    }

    /// Validate, write and commit a complete request in one go.
    pub async fn store<S, B, E>(&self, request: UploadRequest<S>) -> Result<StoredFile, UploadError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<BodyError>,
    {
        let subfolder = request.subfolder.as_deref().unwrap_or("");
        let target = self.prepare_target(subfolder).await?;

        let staged = self
            .receive(
                &request.field_name,
                &request.original_name,
                request.declared_size,
                request.body,
            )
            .await?;

        staged.commit(&target).await
    }

    async fn write_body<S, B, E>(&self, mut body: S, file: &mut tokio::fs::File) -> Result<u64, UploadError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<BodyError>,
    {
        let mut written = 0u64;

        while let Some(chunk) = timeout(self.io_timeout, body.next())
            .await
            .map_err(|_| UploadError::TimedOut)?
        {
            let chunk = chunk.map_err(|e| {
                let e: BodyError = e.into();
                match e {
                    BodyError::TooLarge => UploadError::Policy(PolicyError::SizeExceeded {
                        size: written,
                        limit: self.policy.max_size(),
                    }),
                    BodyError::Broken(msg) => UploadError::Interrupted(msg),
                }
            })?;
            let chunk = chunk.as_ref();

            written += chunk.len() as u64;
            self.policy.check_size(written)?;

            timeout(self.io_timeout, file.write_all(chunk))
                .await
                .map_err(|_| UploadError::TimedOut)??;
        }

        timeout(self.io_timeout, async {
            file.flush().await?;
            file.sync_all().await
        })
        .await
        .map_err(|_| UploadError::TimedOut)??;

        Ok(written)
    }
}

/// An upload fully written to staging, waiting for its target directory.
///
/// Dropping it without committing discards the staged bytes.
#[derive(Debug)]
pub struct StagedUpload {
    upload_id: Uuid,
    staging: StagingFile,
    field_name: String,
    extension: String,
    size: u64,
}

impl StagedUpload {
    /// Bytes received.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the staged file into `target` under a freshly generated name.
    ///
    /// The link never replaces an existing file; on a name clash a new name
    /// is generated.
    pub async fn commit(self, target: &TargetDir) -> Result<StoredFile, UploadError> {
        let mut attempts = 0;

        let filename = loop {
            attempts += 1;
            let filename = naming::generate(&self.field_name, &self.extension);
            let destination = target.path.join(&filename);

            match link_no_clobber(self.staging.path(), &destination).await {
                Ok(()) => break filename,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_COMMIT_ATTEMPTS => {
                    tracing::debug!(upload_id = %self.upload_id, %filename, "Stored name already taken, regenerating");
                }
                Err(e) => {
                    tracing::error!(upload_id = %self.upload_id, error = %e, "Failed to commit upload");
                    return Err(e.into());
                }
            }
        };

        drop(self.staging);

        let relative_path = if target.relative.is_empty() {
            filename.clone()
        } else {
            format!("{}/{}", target.relative, filename)
        };

        tracing::info!(
            upload_id = %self.upload_id,
            path = %relative_path,
            size = self.size,
            state = %UploadState::Committed,
            "Upload committed"
        );

        Ok(StoredFile {
            filename,
            subfolder: (!target.relative.is_empty()).then(|| target.relative.clone()),
            relative_path,
            size: self.size,
            extension: self.extension,
        })
    }
}

/// Link `from` to `to`, failing with `AlreadyExists` if `to` exists.
///
/// Falls back to a checked rename on filesystems without hard links.
async fn link_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::hard_link(from, to).await {
        Err(e) if lacks_hard_links(&e) => {
            tracing::debug!(error = %e, "Hard link refused, renaming instead");
            rename_no_clobber(from, to).await
        }
        result => result,
    }
}

/// Filesystems without hard links report `EOPNOTSUPP`, or `EPERM` on vfat.
fn lacks_hard_links(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
    )
}

async fn rename_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    if tokio::fs::try_exists(to).await? {
        return Err(io::ErrorKind::AlreadyExists.into());
    }
    tokio::fs::rename(from, to).await
}

/// A file in the staging directory, removed when dropped.
#[derive(Debug)]
struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    /// Create the file, failing if it already exists.
    async fn create(path: PathBuf) -> io::Result<(Self, tokio::fs::File)> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        Ok((Self { path }, file))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Discarded staged upload");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staging file");
            }
        }
    }
}
