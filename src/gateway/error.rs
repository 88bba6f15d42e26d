use thiserror::Error;
use uuid::Uuid;

use super::types::LockInfo;

#[derive(Debug, Error)]
pub(crate) enum GatewayError {
    #[error("assessable unit not found: {0}")]
    UnitNotFound(String),
    #[error("submission not found: {0}")]
    SubmissionNotFound(Uuid),
    #[error("submission lock is held by another grader ({})", .0.lock_status.as_str())]
    LockConflict(LockInfo),
    #[error("backend transport failure during {operation}: {message}")]
    Transport { operation: &'static str, message: String },
    #[error("backend returned status {status} during {operation}: {body}")]
    Status { operation: &'static str, status: u16, body: String },
    #[error("failed to decode backend response for {operation}: {message}")]
    Decode { operation: &'static str, message: String },
}
