use axum::{extract::State, Json};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::params::GraderQuery;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::grader::LockStatusResponse;

pub(super) async fn claim_lock(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    query: GraderQuery,
) -> Result<Json<LockStatusResponse>, ApiError> {
    let (location, submission_uuid) = query.submission()?;

    let limits = state.settings().locks();
    let rate_key = format!("rl:lock_claim:{}", staff.user_id);
    let allowed = state
        .redis()
        .rate_limit(&rate_key, limits.claim_rate_limit, limits.claim_rate_window_seconds)
        .await
        .unwrap_or(true);
    if !allowed {
        metrics::record_lock_event("claim", "rate_limited");
        return Err(ApiError::TooManyRequests("Too many lock claims, try again later"));
    }

    let response = state.workflow().claim_lock(&location, submission_uuid, &staff).await?;
    Ok(Json(response))
}

pub(super) async fn release_lock(
    CurrentStaff(staff): CurrentStaff,
    State(state): State<AppState>,
    query: GraderQuery,
) -> Result<Json<LockStatusResponse>, ApiError> {
    let (location, submission_uuid) = query.submission()?;
    let response = state.workflow().release_lock(&location, submission_uuid, &staff).await?;
    Ok(Json(response))
}
