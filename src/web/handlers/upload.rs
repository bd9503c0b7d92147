//! Upload handler.

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    Json,
};
use std::sync::Arc;
use tokio::time::timeout;

use crate::storage::{split_relative, BodyError, StagedUpload, UploadError, UploadState};
use crate::web::dto::{ApiResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Multipart field carrying the optional subfolder.
pub const SUBFOLDER_FIELD: &str = "subfolder";

impl From<MultipartError> for BodyError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            BodyError::TooLarge
        } else {
            BodyError::Broken(err.body_text())
        }
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload request exceeds the body limit");
        ApiError::payload_too_large("Request body too large")
    } else {
        tracing::warn!("Failed to read multipart field: {}", err);
        ApiError::bad_request("Invalid multipart data")
    }
}

fn stalled(waiting_for: &str) -> UploadError {
    tracing::warn!(waiting_for, "Upload stalled");
    UploadError::TimedOut
}

/// Content length declared on the part itself, if any.
fn declared_size(field: &Field<'_>) -> Option<u64> {
    field
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// POST /upload - Store one file.
///
/// Request body: multipart/form-data with a `file` field and an optional
/// `subfolder` field, in either order. The first `subfolder` wins; a second
/// `file` part rejects the request. A `file` part without a filename is not a
/// file and is skipped. Waiting for the next part or for the subfolder text is
/// bounded by the I/O timeout.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected upload request: {}", e);
        ApiError::bad_request("Expected a multipart/form-data body")
    })?;

    tracing::debug!(state = %UploadState::Receiving, "Upload state changed");

    let io_timeout = state.intake.io_timeout();
    let mut subfolder: Option<String> = None;
    let mut staged: Option<StagedUpload> = None;

    loop {
        let next = timeout(io_timeout, multipart.next_field())
            .await
            .map_err(|_| stalled("next part"))?;
        let Some(field) = next.map_err(multipart_error)? else {
            break;
        };

        match field.name() {
            Some(FILE_FIELD) if field.file_name().is_some_and(|n| !n.is_empty()) => {
                if staged.is_some() {
                    return Err(UploadError::MultipleFiles.into());
                }

                let original_name = field.file_name().unwrap_or_default().to_string();
                let size = declared_size(&field);
                let body = field;
                futures::pin_mut!(body);

                staged = Some(
                    state
                        .intake
                        .receive(FILE_FIELD, &original_name, size, body)
                        .await?,
                );
            }
            Some(SUBFOLDER_FIELD) if subfolder.is_none() => {
                let text = timeout(io_timeout, field.text())
                    .await
                    .map_err(|_| stalled("subfolder"))?
                    .map_err(multipart_error)?;
                split_relative(&text).map_err(UploadError::from)?;
                subfolder = Some(text);
            }
            Some(FILE_FIELD) => {
                tracing::debug!("Skipping file field without a filename");
            }
            _ => {}
        }
    }

    let staged = staged.ok_or(UploadError::MissingFile)?;
    let target = state
        .intake
        .prepare_target(subfolder.as_deref().unwrap_or(""))
        .await?;
    let stored = staged.commit(&target).await?;

    Ok(Json(ApiResponse::new(UploadResponse::from(stored))))
}
