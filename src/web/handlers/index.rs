//! Landing page and health check.

use axum::{extract::State, response::Html};
use std::sync::Arc;

use crate::web::handlers::AppState;

/// GET / - Short informational page.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let policy = state.policy();
    let extensions: Vec<&str> = policy.allowed_extensions().collect();
    let extensions = if extensions.is_empty() {
        "none (uploads are disabled)".to_string()
    } else {
        extensions.join(", ")
    };

    Html(format!(
        "<h1>Filedrop is running</h1>\n\
         <p>Upload files with <strong>POST /upload</strong> and browse them at <strong>/files</strong>.</p>\n\
         <p>Send a <strong>subfolder</strong> form field to store a file in a nested folder.</p>\n\
         <p>Allowed extensions: {}. Maximum size: {} bytes.</p>\n",
        html_escape(&extensions),
        policy.max_size()
    ))
}

/// GET /health - Liveness probe.
pub async fn health_check() -> &'static str {
    "OK"
}

fn html_escape(text: &str) -> String {
    text.chars()
        .fold(String::with_capacity(text.len()), |mut out, c| {
            match c {
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '&' => out.push_str("&amp;"),
                '"' => out.push_str("&quot;"),
                _ => out.push(c),
            }
            out
        })
}
