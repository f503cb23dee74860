//! Landing page.

use axum::{extract::State, response::Html};
use minijinja::context;

use crate::error::ApiError;
use crate::state::SharedState;
use crate::templates;

pub async fn index(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let html = templates::render(
        "index.html",
        context! { title => "Keepsake", repository => state.project.repository().uri() },
    )?;
    Ok(Html(html))
}
