//! HTTP handlers.

pub mod files;
pub mod index;
pub mod upload;

use std::time::Duration;

pub use files::*;
pub use index::*;
pub use upload::*;

use crate::storage::{Storage, UploadIntake, UploadPolicy};

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Upload pipeline, which also owns the storage root.
    pub intake: UploadIntake,
}

impl AppState {
    /// Create a new application state.
    pub fn new(storage: Storage, policy: UploadPolicy, io_timeout: Duration) -> Self {
        Self {
            intake: UploadIntake::new(storage, policy, io_timeout),
        }
    }

    /// The storage root.
    pub fn storage(&self) -> &Storage {
        self.intake.storage()
    }

    /// The upload policy.
    pub fn policy(&self) -> &UploadPolicy {
        self.intake.policy()
    }
}
