use thiserror::Error;
use uuid::Uuid;

use crate::gateway::{GatewayError, LockInfo};
use crate::services::location::LocationError;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("invalid ORA location: {0}")]
    BadLocation(String),
    #[error("submission not found: {0}")]
    SubmissionNotFound(Uuid),
    #[error("submission lock is contested ({})", .0.lock_status.as_str())]
    LockContested(LockInfo),
    #[error("grade submission rejected: {0}")]
    GradeSubmit(String),
    #[error("submission backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl From<LocationError> for GradingError {
    fn from(err: LocationError) -> Self {
        Self::BadLocation(err.to_string())
    }
}

impl From<GatewayError> for GradingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::UnitNotFound(location) => {
                Self::BadLocation(format!("{location} does not resolve to an assessment"))
            }
            GatewayError::SubmissionNotFound(uuid) => Self::SubmissionNotFound(uuid),
            GatewayError::LockConflict(info) => Self::LockContested(info),
            other @ (GatewayError::Transport { .. }
            | GatewayError::Status { .. }
            | GatewayError::Decode { .. }) => Self::BackendUnavailable(other.to_string()),
        }
    }
}
