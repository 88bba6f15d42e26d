use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::gateway::{GradeStatus, LockStatus, Score};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeResponse {
    pub(crate) ora_metadata: OraMetadataResponse,
    pub(crate) course_metadata: CourseMetadataResponse,
    pub(crate) submissions: BTreeMap<Uuid, SubmissionMetadataResponse>,
    pub(crate) rubric_config: RubricConfigResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OraMetadataResponse {
    pub(crate) name: String,
    pub(crate) prompts: Vec<String>,
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) text_response_config: Option<String>,
    pub(crate) file_upload_response_config: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseMetadataResponse {
    pub(crate) title: String,
    pub(crate) org: String,
    pub(crate) number: String,
    pub(crate) course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionMetadataResponse {
    #[serde(rename = "submissionUUID")]
    pub(crate) submission_uuid: Uuid,
    pub(crate) username: Option<String>,
    pub(crate) team_name: Option<String>,
    pub(crate) date_submitted: Option<String>,
    pub(crate) date_graded: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) grade_status: GradeStatus,
    pub(crate) lock_status: LockStatus,
    pub(crate) score: Option<Score>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RubricConfigResponse {
    pub(crate) feedback_prompt: String,
    pub(crate) criteria: Vec<RubricCriterionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RubricCriterionResponse {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) description: String,
    pub(crate) feedback_enabled: bool,
    pub(crate) feedback_required: bool,
    pub(crate) options: Vec<RubricOptionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RubricOptionResponse {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) points: u32,
    pub(crate) explanation: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeDataResponse {
    pub(crate) score: Option<Score>,
    pub(crate) overall_feedback: String,
    pub(crate) criteria: Vec<GradedCriterionResponse>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradedCriterionResponse {
    pub(crate) name: String,
    pub(crate) feedback: String,
    pub(crate) points: Option<u32>,
    pub(crate) selected_option: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseContent {
    pub(crate) text: Vec<String>,
    pub(crate) files: Vec<ResponseFile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponseFile {
    pub(crate) download_url: String,
    pub(crate) description: String,
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionFetchResponse {
    pub(crate) grade_status: GradeStatus,
    pub(crate) lock_status: LockStatus,
    pub(crate) grade_data: GradeDataResponse,
    pub(crate) response: ResponseContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusFetchResponse {
    pub(crate) grade_status: GradeStatus,
    pub(crate) lock_status: LockStatus,
    pub(crate) grade_data: GradeDataResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LockStatusResponse {
    pub(crate) lock_status: LockStatus,
}

/// Grade body posted by the grading UI.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeSubmission {
    #[serde(default)]
    pub(crate) overall_feedback: String,
    #[serde(default)]
    #[validate(nested, custom(function = "validate_unique_criteria"))]
    pub(crate) criteria: Vec<CriterionGrade>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CriterionGrade {
    #[validate(length(min = 1, message = "criterion name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
    #[serde(default)]
    pub(crate) selected_option: Option<String>,
}

fn validate_unique_criteria(criteria: &[CriterionGrade]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if criteria.iter().all(|criterion| seen.insert(criterion.name.as_str())) {
        Ok(())
    } else {
        let mut error = ValidationError::new("duplicate_criterion");
        error.message = Some("each criterion may be graded only once".into());
        Err(error)
    }
}
