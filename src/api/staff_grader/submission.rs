use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::params::GraderQuery;
use crate::core::state::AppState;
use crate::schemas::grader::{GradeSubmission, StatusFetchResponse, SubmissionFetchResponse};

pub(super) async fn fetch_submission(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    query: GraderQuery,
) -> Result<Json<SubmissionFetchResponse>, ApiError> {
    let (location, submission_uuid) = query.submission()?;
    let response = state.workflow().fetch_submission(&location, submission_uuid, &staff).await?;
    Ok(Json(response))
}

pub(super) async fn fetch_status(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    query: GraderQuery,
) -> Result<Json<StatusFetchResponse>, ApiError> {
    let (location, submission_uuid) = query.submission()?;
    let response = state.workflow().fetch_status(&location, submission_uuid, &staff).await?;
    Ok(Json(response))
}

pub(super) async fn submit_grade(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    query: GraderQuery,
    payload: Result<Json<GradeSubmission>, JsonRejection>,
) -> Result<Json<StatusFetchResponse>, ApiError> {
    let (location, submission_uuid) = query.submission()?;
    let Json(payload) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    payload.validate()?;

    let response =
        state.workflow().submit_grade(&location, submission_uuid, &staff, &payload).await?;
    Ok(Json(response))
}
