//! Liveness check and diagnostic error page.

use axum::{response::Html, Json};
use minijinja::context;
use serde_json::{json, Value};

use crate::error::{error_page, ApiError};
use crate::templates;

/// GET /healthz - never touches the repository
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /error - renders the error page on purpose
pub async fn error_page_demo() -> Result<Html<String>, ApiError> {
    let html = templates::render("error.html", context! { title => "Error", message => "Manually triggered error" })?;
    Ok(Html(html))
}

/// Unmatched routes
pub async fn not_found() -> axum::response::Response {
    error_page("Page not found")
}
