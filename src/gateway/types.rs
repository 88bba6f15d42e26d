use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lock state as seen by the requester. The backend spells the free state
/// either `unlocked` or `not-locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LockStatus {
    #[serde(rename = "unlocked", alias = "not-locked")]
    Unlocked,
    #[serde(rename = "locked")]
    Locked,
    #[serde(rename = "in-progress")]
    InProgress,
}

impl LockStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Unlocked => "unlocked",
            Self::Locked => "locked",
            Self::InProgress => "in-progress",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GradeStatus {
    Graded,
    Ungraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LockInfo {
    pub(crate) lock_status: LockStatus,
    #[serde(default)]
    pub(crate) owner_id: Option<String>,
}

impl LockInfo {
    pub(crate) fn with_status(lock_status: LockStatus) -> Self {
        Self { lock_status, owner_id: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Score {
    pub(crate) points_earned: u32,
    pub(crate) points_possible: u32,
}

/// One row of `list_staff_workflows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkflowSummary {
    #[serde(rename = "submissionUUID")]
    pub(crate) submission_uuid: Uuid,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) team_name: Option<String>,
    #[serde(default)]
    pub(crate) date_submitted: Option<String>,
    #[serde(default)]
    pub(crate) date_graded: Option<String>,
    #[serde(default)]
    pub(crate) graded_by: Option<String>,
    pub(crate) grading_status: GradeStatus,
    pub(crate) lock_status: LockStatus,
    #[serde(default)]
    pub(crate) score: Option<Score>,
}

pub(crate) type WorkflowList = BTreeMap<Uuid, WorkflowSummary>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FeedbackMode {
    #[default]
    Disabled,
    Optional,
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RubricOption {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) label: String,
    pub(crate) points: u32,
    #[serde(default)]
    pub(crate) explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RubricCriterion {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) label: String,
    #[serde(default)]
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) feedback: FeedbackMode,
    #[serde(default)]
    pub(crate) options: Vec<RubricOption>,
}

impl RubricCriterion {
    /// Criteria without options are feedback-only and carry no points.
    pub(crate) fn is_feedback_only(&self) -> bool {
        self.options.is_empty()
    }

    pub(crate) fn max_points(&self) -> u32 {
        self.options.iter().map(|option| option.points).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub(crate) struct RubricConfig {
    #[serde(default)]
    pub(crate) feedback_prompt: Option<String>,
    #[serde(default)]
    pub(crate) criteria: Vec<RubricCriterion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionFile {
    pub(crate) download_url: String,
    #[serde(default)]
    pub(crate) description: String,
    pub(crate) name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub(crate) struct SubmissionInfo {
    #[serde(default)]
    pub(crate) text: Vec<String>,
    #[serde(default)]
    pub(crate) files: Vec<SubmissionFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AssessedCriterion {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) feedback: String,
    #[serde(default)]
    pub(crate) points: Option<u32>,
    #[serde(default)]
    pub(crate) option: Option<String>,
}

/// A persisted staff grade. Absent (`None` at the gateway) until graded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AssessmentInfo {
    #[serde(default)]
    pub(crate) feedback: String,
    #[serde(default)]
    pub(crate) score: Option<Score>,
    #[serde(default)]
    pub(crate) criteria: Vec<AssessedCriterion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum AssessType {
    #[serde(rename = "full-grade")]
    FullGrade,
}

/// Body of the `staff_assess` handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StaffAssessRequest {
    pub(crate) submission_uuid: Uuid,
    pub(crate) options_selected: BTreeMap<String, String>,
    pub(crate) criterion_feedback: BTreeMap<String, String>,
    pub(crate) overall_feedback: String,
    pub(crate) assess_type: AssessType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StaffAssessResponse {
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OraMetadata {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) prompts: Vec<String>,
    #[serde(default)]
    pub(crate) teams_enabled: bool,
    #[serde(default)]
    pub(crate) text_response: Option<String>,
    #[serde(default)]
    pub(crate) file_upload_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CourseMetadata {
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) org: String,
    #[serde(default)]
    pub(crate) number: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lock_status_accepts_not_locked_alias() {
        let info: LockInfo = serde_json::from_value(json!({"lock_status": "not-locked"})).unwrap();
        assert_eq!(info.lock_status, LockStatus::Unlocked);
        assert_eq!(serde_json::to_value(info.lock_status).unwrap(), json!("unlocked"));
    }

    #[test]
    fn workflow_summary_reads_backend_keys() {
        let summary: WorkflowSummary = serde_json::from_value(json!({
            "submissionUUID": "8f0c4c4e-6f43-4a53-9d0f-2a6f1d2c9b11",
            "username": "learner",
            "teamName": null,
            "dateSubmitted": "2024-01-02T03:04:05Z",
            "gradingStatus": "ungraded",
            "lockStatus": "in-progress",
        }))
        .unwrap();

        assert_eq!(summary.username.as_deref(), Some("learner"));
        assert_eq!(summary.grading_status, GradeStatus::Ungraded);
        assert_eq!(summary.lock_status, LockStatus::InProgress);
        assert!(summary.score.is_none());
    }

    #[test]
    fn staff_assess_request_serializes_full_grade() {
        let request = StaffAssessRequest {
            submission_uuid: Uuid::nil(),
            options_selected: BTreeMap::from([("Ideas".to_string(), "Good".to_string())]),
            criterion_feedback: BTreeMap::new(),
            overall_feedback: "Nice".to_string(),
            assess_type: AssessType::FullGrade,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["assess_type"], "full-grade");
        assert_eq!(value["options_selected"]["Ideas"], "Good");
    }
}
