//! Axum router — maps all URL paths to handlers.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

use crate::error::handle_panic;
use crate::handlers::{
    api::{api_experiment, api_experiments},
    experiments::{delete_experiment, get_experiment, list_experiments, stop_experiment},
    index::index,
    system::{error_page_demo, healthz, not_found},
};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Pages
        .route("/",                         get(index))
        .route("/experiments",              get(list_experiments))
        .route("/experiments/{id}",         get(get_experiment))
        .route("/experiments/{id}/delete",  get(delete_experiment))
        .route("/experiments/{id}/stop",    get(stop_experiment))
        .route("/error",                    get(error_page_demo))
        .route("/healthz",                  get(healthz))

        // API endpoints
        .route("/api/experiments",          get(api_experiments))
        .route("/api/experiments/{id}",     get(api_experiment))

        .fallback(not_found)

        // Middleware
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
