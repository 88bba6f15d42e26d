//! Boundary to the submission backend (the ORA XBlock handlers) and to the
//! course content catalog. The backend owns lock records and grades; nothing
//! here caches either.

mod error;
mod http;
mod memory;
mod types;

use async_trait::async_trait;
use uuid::Uuid;

use crate::services::identity::StaffIdentity;
use crate::services::location::OraLocation;

pub(crate) use error::GatewayError;
pub(crate) use http::HttpSubmissionBackend;
pub(crate) use memory::InMemoryBackend;
pub(crate) use types::{
    AssessType, AssessedCriterion, AssessmentInfo, CourseMetadata, FeedbackMode, GradeStatus,
    LockInfo, LockStatus, OraMetadata, RubricConfig, RubricCriterion, RubricOption, Score,
    StaffAssessRequest, StaffAssessResponse, SubmissionFile, SubmissionInfo, WorkflowList,
    WorkflowSummary,
};

/// The eight backend operations. Lock operations report status relative to
/// `requester`; `claim_lock` must be an atomic check-and-set.
#[async_trait]
pub(crate) trait SubmissionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_workflows(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
    ) -> Result<WorkflowList, GatewayError>;

    async fn get_rubric(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
    ) -> Result<RubricConfig, GatewayError>;

    async fn get_submission_info(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<SubmissionInfo, GatewayError>;

    async fn get_assessment_info(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<Option<AssessmentInfo>, GatewayError>;

    async fn check_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError>;

    /// Fails with [`GatewayError::LockConflict`] when another grader holds the lock.
    async fn claim_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError>;

    /// Fails with [`GatewayError::LockConflict`] when another grader holds the lock.
    async fn delete_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError>;

    async fn staff_assess(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
        assessment: &StaffAssessRequest,
    ) -> Result<StaffAssessResponse, GatewayError>;
}

/// Unit and course metadata. `None` means the key does not resolve.
#[async_trait]
pub(crate) trait ContentCatalog: Send + Sync {
    async fn get_ora_metadata(
        &self,
        location: &OraLocation,
    ) -> Result<Option<OraMetadata>, GatewayError>;

    async fn get_course_metadata(
        &self,
        course_key: &str,
    ) -> Result<Option<CourseMetadata>, GatewayError>;
}
