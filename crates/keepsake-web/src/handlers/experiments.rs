//! Experiment list, detail page, and lifecycle actions.

use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
};
use minijinja::context;
use tracing::info;

use crate::error::ApiError;
use crate::state::SharedState;
use crate::templates;
use crate::view::{sort_newest_first, ExperimentDetail, ExperimentSummary};

/// GET /experiments - all experiments, newest first
pub async fn list_experiments(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let mut experiments = state.project.experiments().list().await?;
    sort_newest_first(&mut experiments);
    let rows: Vec<ExperimentSummary> = experiments.iter().map(ExperimentSummary::from_experiment).collect();

    let html = templates::render("experiment_list.html", context! { title => "Experiments", experiments => rows })?;
    Ok(Html(html))
}

/// GET /experiments/{id} - full id or unique prefix
pub async fn get_experiment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let exp = state.project.experiments().get(&id).await?;
    let detail = ExperimentDetail::from_experiment(&exp);

    let html = templates::render("experiment.html", context! { title => "Experiment", exp => detail })?;
    Ok(Html(html))
}

/// GET /experiments/{id}/delete
pub async fn delete_experiment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    let exp = state.project.experiments().get(&id).await?;
    let short_id = exp.short_id().to_string();
    exp.delete().await?;
    info!(experiment = %short_id, "Deleted from web UI");
    Ok(Redirect::to("/experiments"))
}

/// GET /experiments/{id}/stop
pub async fn stop_experiment(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    let mut exp = state.project.experiments().get(&id).await?;
    exp.stop().await?;
    Ok(Redirect::to(&format!("/experiments/{}", exp.id())))
}
