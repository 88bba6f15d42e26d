use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use validator::ValidationErrors;

use crate::gateway::{LockInfo, LockStatus};
use crate::services::auth::AuthError;
use crate::services::error::GradingError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    error: &'static str,
    detail: String,
    #[serde(rename = "lockStatus", skip_serializing_if = "Option::is_none")]
    lock_status: Option<LockStatus>,
    #[serde(rename = "lockOwner", skip_serializing_if = "Option::is_none")]
    lock_owner: Option<String>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    MissingParam(String),
    BadRequest(String),
    BadLocation(String),
    Forbidden(&'static str),
    NotFound(String),
    LockContested(LockInfo),
    GradeSubmit(String),
    TooManyRequests(&'static str),
    BackendUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingParam(_)
            | Self::BadRequest(_)
            | Self::BadLocation(_)
            | Self::GradeSubmit(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) | Self::LockContested(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::MissingParam(_) => "ERR_MISSING_PARAM",
            Self::BadRequest(_) => "ERR_BAD_REQUEST",
            Self::BadLocation(_) => "ERR_BAD_ORA_LOCATION",
            Self::Forbidden(_) => "ERR_FORBIDDEN",
            Self::NotFound(_) => "ERR_SUBMISSION_NOT_FOUND",
            Self::LockContested(_) => "ERR_LOCK_CONTESTED",
            Self::GradeSubmit(_) => "ERR_GRADE_SUBMIT",
            Self::TooManyRequests(_) => "ERR_RATE_LIMITED",
            Self::BackendUnavailable(_) => "ERR_BACKEND_UNAVAILABLE",
            Self::Internal(_) => "ERR_INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.code();
        let mut lock_status = None;
        let mut lock_owner = None;

        let detail = match self {
            ApiError::MissingParam(names) => {
                format!("Missing required query parameter(s): {names}")
            }
            ApiError::BadRequest(message)
            | ApiError::BadLocation(message)
            | ApiError::NotFound(message)
            | ApiError::GradeSubmit(message) => message,
            ApiError::Forbidden(message) | ApiError::TooManyRequests(message) => {
                message.to_string()
            }
            ApiError::LockContested(info) => {
                lock_status = Some(info.lock_status);
                lock_owner = info.owner_id;
                "Submission is locked by another grader".to_string()
            }
            ApiError::BackendUnavailable(message) => {
                tracing::error!(error = %message, "Submission backend unavailable");
                "Submission backend is unavailable".to_string()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
        };

        (
            status,
            Json(ErrorResponse { status: status.as_u16(), error, detail, lock_status, lock_owner }),
        )
            .into_response()
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        match err {
            GradingError::BadLocation(message) => Self::BadLocation(message),
            GradingError::SubmissionNotFound(uuid) => {
                Self::NotFound(format!("Submission {uuid} not found"))
            }
            GradingError::LockContested(info) => Self::LockContested(info),
            GradingError::GradeSubmit(message) => Self::GradeSubmit(message),
            GradingError::BackendUnavailable(message) => Self::BackendUnavailable(message),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(method) => {
                tracing::debug!(method = method.as_str(), "credential rejected");
                Self::Forbidden("Invalid authentication credentials")
            }
            AuthError::Missing => Self::Forbidden("Authentication credentials were not provided"),
            AuthError::Store(message) => {
                ApiError::internal(message, "Failed to verify credentials")
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn lock_contested_body_carries_holder() {
        let info =
            LockInfo { lock_status: LockStatus::Locked, owner_id: Some("staff-a".to_string()) };

        let response = ApiError::LockContested(info).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = test_support::read_json(response).await;
        assert_eq!(body["error"], "ERR_LOCK_CONTESTED");
        assert_eq!(body["lockStatus"], "locked");
        assert_eq!(body["lockOwner"], "staff-a");
    }

    #[tokio::test]
    async fn backend_failures_hide_transport_details() {
        let response = ApiError::BackendUnavailable("connection refused to 10.0.0.5".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = test_support::read_json(response).await;
        assert_eq!(body["error"], "ERR_BACKEND_UNAVAILABLE");
        assert_eq!(body["detail"], "Submission backend is unavailable");
        assert!(body.get("lockStatus").is_none());
    }
}
