//! Error types for Filedrop.

use thiserror::Error;

/// Common error type for Filedrop.
#[derive(Error, Debug)]
pub enum FiledropError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration or user input.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias for Filedrop operations.
pub type Result<T> = std::result::Result<T, FiledropError>;
