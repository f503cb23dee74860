//! Shared application state for the web server.

use std::sync::Arc;

use keepsake_store::Project;

/// Shared state injected into every Axum handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub project: Project,
}

impl AppState {
    pub fn new(project: Project) -> Self {
        Self { project }
    }
}

pub type SharedState = Arc<AppState>;
