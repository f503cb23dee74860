//! Request error boundary.
//!
//! Every handler failure (unknown id, repository or daemon failure, template
//! failure, panic) is logged and answered with the error page and status 404.

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use keepsake_common::KeepsakeError;
use minijinja::context;
use thiserror::Error;
use tracing::error;

use crate::templates;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Keepsake(#[from] KeepsakeError),

    #[error("Template error: {0}")]
    Render(#[from] minijinja::Error),
}

impl ApiError {
    pub const STATUS: StatusCode = StatusCode::NOT_FOUND;

    fn log(&self) {
        error!(error = %self, details = ?self, "Request failed");
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        error_page(&self.to_string())
    }
}

/// Same boundary for the JSON API: `{"error": "..."}` with status 404.
#[derive(Debug)]
pub struct JsonError(pub ApiError);

impl From<KeepsakeError> for JsonError {
    fn from(e: KeepsakeError) -> Self {
        Self(ApiError::Keepsake(e))
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        self.0.log();
        (ApiError::STATUS, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Rendered error page with status 404; plain text if the page itself cannot render.
pub fn error_page(message: &str) -> Response {
    match templates::render("error.html", context! { title => "Error", message => message }) {
        Ok(html) => (ApiError::STATUS, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Error page failed to render");
            (ApiError::STATUS, format!("Error: {message}")).into_response()
        }
    }
}

/// Response for a panicking handler, installed through `CatchPanicLayer`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Unknown panic".to_string()
    };
    error!(panic = %message, "Handler panicked");
    error_page(&message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_maps_to_404() {
        let not_found = ApiError::from(KeepsakeError::ExperimentNotFound("xxxxxx".into()));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let daemon = ApiError::from(KeepsakeError::Daemon("unavailable".into()));
        assert_eq!(daemon.into_response().status(), StatusCode::NOT_FOUND);

        let json = JsonError::from(KeepsakeError::UnsupportedRepository("s3://x".into()));
        assert_eq!(json.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_panic_payloads_become_error_pages() {
        let resp = handle_panic(Box::new("boom"));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = handle_panic(Box::new(String::from("boom")));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = handle_panic(Box::new(42_u8));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
