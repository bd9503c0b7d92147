//! Listing and download handlers.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Build a `Content-Disposition: inline` value for a served file.
///
/// Control characters are dropped, and quotes and backslashes are replaced in
/// the plain `filename` parameter. Anything that is not plain ASCII is also
/// sent RFC 5987 encoded in `filename*`.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("inline; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);

    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// GET /files, GET /list-files - List every stored file.
///
/// Returns a JSON array of `/`-separated paths relative to the upload root.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let files = state.storage().list_all().await?;
    tracing::debug!(count = files.len(), "Listed stored files");
    Ok(Json(files))
}

/// GET /files/*path - Serve a stored file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(requested): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let file = state.storage().resolve_file(&requested).await.map_err(|e| {
        tracing::debug!(path = %requested, error = %e, "File not served");
        e
    })?;

    let content = file.read().await?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, &file.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&file.file_name()),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_header_generated_name() {
        let result = content_disposition_header("file-1718000000000000-42.png");
        assert_eq!(result, "inline; filename=\"file-1718000000000000-42.png\"");
    }

    #[test]
    fn test_content_disposition_header_with_spaces() {
        let result = content_disposition_header("my document.txt");
        assert_eq!(result, "inline; filename=\"my document.txt\"");
    }

    #[test]
    fn test_content_disposition_header_non_ascii() {
        let result = content_disposition_header("日本語ファイル.txt");
        assert!(result.starts_with("inline; filename=\""));
        assert!(result.contains("filename*=UTF-8''"));
        assert!(result.contains("%E6%97%A5%E6%9C%AC%E8%AA%9E"));
    }

    #[test]
    fn test_content_disposition_header_quote_and_backslash() {
        let result = content_disposition_header("a\"b\\c.txt");
        assert!(result.contains("filename=\"a_b_c.txt\""));
        assert!(result.contains("%22"));
    }

    #[test]
    fn test_content_disposition_header_header_injection() {
        let result = content_disposition_header("file\"\r\nX-Evil: header\r\n\r\n<script>.txt");
        assert!(!result.contains('\r'));
        assert!(!result.contains('\n'));
        assert!(result.starts_with("inline; filename="));
    }
}
