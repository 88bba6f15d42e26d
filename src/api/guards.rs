use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::services::identity::StaffIdentity;

/// The staff member behind the request, resolved by the configured
/// authenticator chain.
pub(crate) struct CurrentStaff(pub(crate) StaffIdentity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentStaff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let staff = app_state.auth().authenticate(&parts.headers).await?;
        tracing::Span::current().record("staff", staff.user_id.as_str());

        Ok(CurrentStaff(staff))
    }
}
