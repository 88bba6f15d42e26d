mod lock;
mod submission;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::params::GraderQuery;
use crate::core::state::AppState;
use crate::schemas::grader::InitializeResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/initialize", get(initialize))
        .route("/submission", get(submission::fetch_submission))
        .route("/submission/status", get(submission::fetch_status))
        .route("/submission/grade", post(submission::submit_grade))
        .route("/submission/lock", post(lock::claim_lock).delete(lock::release_lock))
}

async fn initialize(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    query: GraderQuery,
) -> Result<Json<InitializeResponse>, ApiError> {
    let location = query.location()?;
    let response = state.workflow().initialize(&location, &staff).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests;
