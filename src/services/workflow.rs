use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::core::metrics;
use crate::gateway::{
    AssessType, AssessmentInfo, ContentCatalog, CourseMetadata, OraMetadata, StaffAssessRequest,
    SubmissionBackend,
};
use crate::schemas::grader::{
    GradeSubmission, InitializeResponse, LockStatusResponse, StatusFetchResponse,
    SubmissionFetchResponse,
};
use crate::services::error::GradingError;
use crate::services::identity::StaffIdentity;
use crate::services::locks::LockCoordinator;
use crate::services::location::OraLocation;
use crate::services::shaping;

/// Runs the staff grading operations against the backend. Stateless: every
/// call reads fresh data and nothing survives the request.
#[derive(Clone)]
pub(crate) struct GradingWorkflow {
    backend: Arc<dyn SubmissionBackend>,
    catalog: Arc<dyn ContentCatalog>,
    locks: LockCoordinator,
}

impl GradingWorkflow {
    pub(crate) fn new(
        backend: Arc<dyn SubmissionBackend>,
        catalog: Arc<dyn ContentCatalog>,
    ) -> Self {
        let locks = LockCoordinator::new(Arc::clone(&backend));
        Self { backend, catalog, locks }
    }

    pub(crate) async fn initialize(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
    ) -> Result<InitializeResponse, GradingError> {
        let course_key = location.course_key();
        let (ora, course, workflows, rubric) = tokio::try_join!(
            self.resolve_unit(location),
            self.resolve_course(&course_key),
            async {
                self.backend.list_workflows(location, requester).await.map_err(GradingError::from)
            },
            async {
                self.backend.get_rubric(location, requester).await.map_err(GradingError::from)
            },
        )?;

        tracing::debug!(%location, submissions = workflows.len(), "grading session initialized");
        Ok(shaping::initialize_response(ora, course, workflows, rubric))
    }

    pub(crate) async fn fetch_submission(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<SubmissionFetchResponse, GradingError> {
        let (submission, assessment, lock) = tokio::try_join!(
            async {
                self.backend
                    .get_submission_info(location, submission_uuid, requester)
                    .await
                    .map_err(GradingError::from)
            },
            self.assessment(location, submission_uuid, requester),
            self.locks.check(location, submission_uuid, requester),
        )?;

        Ok(shaping::submission_fetch_response(submission, assessment, &lock))
    }

    pub(crate) async fn fetch_status(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<StatusFetchResponse, GradingError> {
        let (assessment, lock) = tokio::try_join!(
            self.assessment(location, submission_uuid, requester),
            self.locks.check(location, submission_uuid, requester),
        )?;

        Ok(shaping::status_fetch_response(assessment, &lock))
    }

    /// Commits a grade for a submission the requester currently holds, then
    /// releases the lock and returns the refreshed status. A rejected grade
    /// leaves the lock with the requester.
    pub(crate) async fn submit_grade(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
        grade: &GradeSubmission,
    ) -> Result<StatusFetchResponse, GradingError> {
        self.locks.ensure_held(location, submission_uuid, requester).await?;

        let assessment = build_staff_assessment(submission_uuid, grade);
        let outcome = match self.backend.staff_assess(location, requester, &assessment).await {
            Ok(outcome) => outcome,
            Err(err) => {
                metrics::record_grade_submission("error");
                return Err(err.into());
            }
        };

        if !outcome.success {
            metrics::record_grade_submission("rejected");
            tracing::info!(
                %location,
                %submission_uuid,
                grader = %requester.user_id,
                reason = %outcome.msg,
                "staff grade rejected"
            );
            let msg = if outcome.msg.is_empty() {
                "grade was rejected by the submission backend".to_string()
            } else {
                outcome.msg
            };
            return Err(GradingError::GradeSubmit(msg));
        }

        metrics::record_grade_submission("accepted");
        tracing::info!(
            %location,
            %submission_uuid,
            grader = %requester.user_id,
            "staff grade submitted"
        );

        self.locks.release_after_grade(location, submission_uuid, requester).await;
        self.fetch_status(location, submission_uuid, requester).await
    }

    pub(crate) async fn claim_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockStatusResponse, GradingError> {
        self.resolve_unit(location).await?;
        let lock = self.locks.claim(location, submission_uuid, requester).await?;
        Ok(shaping::lock_status_response(&lock))
    }

    pub(crate) async fn release_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockStatusResponse, GradingError> {
        self.resolve_unit(location).await?;
        let lock = self.locks.release(location, submission_uuid, requester).await?;
        Ok(shaping::lock_status_response(&lock))
    }

    async fn assessment(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<Option<AssessmentInfo>, GradingError> {
        Ok(self.backend.get_assessment_info(location, submission_uuid, requester).await?)
    }

    async fn resolve_unit(&self, location: &OraLocation) -> Result<OraMetadata, GradingError> {
        self.catalog
            .get_ora_metadata(location)
            .await?
            .ok_or_else(|| {
                GradingError::BadLocation(format!("{location} is not a known assessment"))
            })
    }

    async fn resolve_course(&self, course_key: &str) -> Result<CourseMetadata, GradingError> {
        self.catalog
            .get_course_metadata(course_key)
            .await?
            .ok_or_else(|| GradingError::BadLocation(format!("course {course_key} does not exist")))
    }
}

/// Translates the UI grade into the backend payload. Criteria only appear in
/// a map when they carry a non-empty value.
pub(crate) fn build_staff_assessment(
    submission_uuid: Uuid,
    grade: &GradeSubmission,
) -> StaffAssessRequest {
    let mut options_selected = BTreeMap::new();
    let mut criterion_feedback = BTreeMap::new();

    for criterion in &grade.criteria {
        if let Some(option) =
            criterion.selected_option.as_deref().filter(|value| !value.is_empty())
        {
            options_selected.insert(criterion.name.clone(), option.to_string());
        }
        if let Some(feedback) = criterion.feedback.as_deref().filter(|value| !value.is_empty()) {
            criterion_feedback.insert(criterion.name.clone(), feedback.to_string());
        }
    }

    StaffAssessRequest {
        submission_uuid,
        options_selected,
        criterion_feedback,
        overall_feedback: grade.overall_feedback.clone(),
        assess_type: AssessType::FullGrade,
    }
}
