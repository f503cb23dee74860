//! JSON views of the experiment pages.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::JsonError;
use crate::state::SharedState;
use crate::view::{sort_newest_first, ExperimentDetail, ExperimentSummary};

/// GET /api/experiments
pub async fn api_experiments(State(state): State<SharedState>) -> Result<Json<Vec<ExperimentSummary>>, JsonError> {
    let mut experiments = state.project.experiments().list().await?;
    sort_newest_first(&mut experiments);
    Ok(Json(experiments.iter().map(ExperimentSummary::from_experiment).collect()))
}

/// GET /api/experiments/{id}
pub async fn api_experiment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ExperimentDetail>, JsonError> {
    let exp = state.project.experiments().get(&id).await?;
    Ok(Json(ExperimentDetail::from_experiment(&exp)))
}
