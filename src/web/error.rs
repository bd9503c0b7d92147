//! API error handling for the Filedrop HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::{ListError, PolicyError, RetrievalError, UploadError};

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Not found (404).
    NotFound,
    /// Request timeout (408).
    RequestTimeout,
    /// Payload too large (413).
    PayloadTooLarge,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a payload too large error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadTooLarge, message)
    }

    /// Create a request timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RequestTimeout, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The message sent to the client.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match &err {
            UploadError::MissingFile
            | UploadError::MultipleFiles
            | UploadError::Policy(PolicyError::ExtensionRejected { .. })
            | UploadError::Policy(PolicyError::SizeExceeded { .. }) => {
                ApiError::bad_request(err.to_string())
            }
            UploadError::Path(e) if e.is_client_error() => ApiError::bad_request(err.to_string()),
            // A truncated body is the client's fault as far as the response goes.
            UploadError::Interrupted(_) => ApiError::bad_request(err.to_string()),
            UploadError::TimedOut => ApiError::timeout(err.to_string()),
            UploadError::Path(_) | UploadError::Disk(_) => {
                tracing::error!("Upload failed: {}", err);
                ApiError::internal("Failed to store the uploaded file")
            }
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::NotFound | RetrievalError::Escape => {
                ApiError::not_found("File not found")
            }
            RetrievalError::Io(e) => {
                tracing::error!("Failed to read stored file: {}", e);
                ApiError::internal("Failed to read the file")
            }
        }
    }
}

impl From<ListError> for ApiError {
    fn from(err: ListError) -> Self {
        tracing::error!("Failed to list files: {}", err);
        ApiError::internal("Unable to scan files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PathError;
    use std::io;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::RequestTimeout.status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            ErrorCode::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upload_error_mapping() {
        assert_eq!(
            ApiError::from(UploadError::MissingFile).code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ApiError::from(UploadError::Policy(PolicyError::ExtensionRejected {
                extension: "exe".into()
            }))
            .code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ApiError::from(UploadError::Policy(PolicyError::SizeExceeded {
                size: 10,
                limit: 5
            }))
            .code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ApiError::from(UploadError::Path(PathError::Escape)).code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            ApiError::from(UploadError::TimedOut).code(),
            ErrorCode::RequestTimeout
        );
        assert_eq!(
            ApiError::from(UploadError::Disk(io::Error::other("disk full"))).code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_disk_error_message_is_generic() {
        let err = ApiError::from(UploadError::Disk(io::Error::other("/srv/uploads is full")));
        assert!(!err.message().contains("/srv"));
    }

    #[test]
    fn test_retrieval_escape_is_not_found() {
        let err = ApiError::from(RetrievalError::Escape);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.message(), "File not found");
    }

    #[test]
    fn test_list_error_is_internal() {
        let err = ApiError::from(ListError::Unreadable {
            path: "/srv/uploads".into(),
            source: io::Error::other("denied"),
        });
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(!err.message().contains("/srv"));
    }
}
