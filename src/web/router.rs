//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;

use super::handlers::{download_file, health_check, index, list_files, upload_file, AppState};
use super::middleware::{create_cors_layer, security_headers};

/// Room left in the request body limit for multipart framing and form fields.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create the main router.
pub fn create_router(app_state: Arc<AppState>, config: &WebConfig) -> Router {
    let body_limit = app_state
        .policy()
        .max_size()
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let upload_routes = Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(body_limit));

    let file_routes = Router::new()
        .route("/files", get(list_files))
        .route("/list-files", get(list_files))
        .route("/files/*path", get(download_file));

    let mut router = Router::new()
        .route("/", get(index))
        .merge(create_health_router())
        .merge(upload_routes)
        .merge(file_routes)
        .with_state(app_state);

    if config.serve_static {
        if let Some(static_service) = create_static_service(&config.static_path) {
            router = router.fallback_service(static_service);
        }
    }

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(&config.cors_origins))
            .layer(middleware::from_fn(security_headers))
            .layer(CompressionLayer::new()),
    )
}

/// Create a health check router.
pub fn create_health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health_check))
}

/// Serve the static assets directory, if it exists.
fn create_static_service(static_path: &str) -> Option<ServeDir> {
    if Path::new(static_path).is_dir() {
        tracing::info!(path = static_path, "Serving static files");
        Some(ServeDir::new(static_path))
    } else {
        tracing::debug!(path = static_path, "Static directory not found, not serving it");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, UploadPolicy};
    use axum::{body::Body, http::Request, http::StatusCode};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn app(static_dir: Option<&Path>) -> (TempDir, Router) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path()).unwrap();
        let state = Arc::new(AppState::new(
            storage,
            UploadPolicy::from_list("txt", 1024),
            Duration::from_secs(5),
        ));
        let config = WebConfig {
            serve_static: static_dir.is_some(),
            static_path: static_dir
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..WebConfig::default()
        };
        (temp_dir, create_router(state, &config))
    }

    async fn get(router: Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_route() {
        let (_temp_dir, router) = app(None);
        let response = get(router, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_without_static() {
        let (_temp_dir, router) = app(None);
        let response = get(router, "/nope.html").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_fallback() {
        let public = TempDir::new().unwrap();
        std::fs::write(public.path().join("hello.txt"), b"static").unwrap();

        let (_temp_dir, router) = app(Some(public.path()));
        let response = get(router, "/hello.txt").await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_missing_static_dir_is_skipped() {
        assert!(create_static_service("/definitely/not/here").is_none());
    }
}
