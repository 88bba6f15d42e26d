//! Maps gateway data into the payloads the grading UI expects.

use crate::gateway::{
    AssessmentInfo, CourseMetadata, FeedbackMode, GradeStatus, LockInfo, OraMetadata, RubricConfig,
    SubmissionInfo, WorkflowList,
};
use crate::schemas::grader::{
    CourseMetadataResponse, GradeDataResponse, GradedCriterionResponse, InitializeResponse,
    LockStatusResponse, OraMetadataResponse, ResponseContent, ResponseFile, RubricConfigResponse,
    RubricCriterionResponse, RubricOptionResponse, StatusFetchResponse, SubmissionFetchResponse,
    SubmissionMetadataResponse,
};

pub(crate) fn initialize_response(
    ora: OraMetadata,
    course: CourseMetadata,
    workflows: WorkflowList,
    rubric: RubricConfig,
) -> InitializeResponse {
    InitializeResponse {
        ora_metadata: ora_metadata(ora),
        course_metadata: CourseMetadataResponse {
            title: course.name,
            org: course.org,
            number: course.number,
            course_id: course.id,
        },
        submissions: workflows
            .into_iter()
            .map(|(uuid, summary)| {
                let submission = SubmissionMetadataResponse {
                    submission_uuid: summary.submission_uuid,
                    username: summary.username,
                    team_name: summary.team_name,
                    date_submitted: summary.date_submitted,
                    date_graded: summary.date_graded,
                    graded_by: summary.graded_by,
                    grade_status: summary.grading_status,
                    lock_status: summary.lock_status,
                    score: summary.score,
                };
                (uuid, submission)
            })
            .collect(),
        rubric_config: rubric_config(rubric),
    }
}

pub(crate) fn submission_fetch_response(
    submission: SubmissionInfo,
    assessment: Option<AssessmentInfo>,
    lock: &LockInfo,
) -> SubmissionFetchResponse {
    SubmissionFetchResponse {
        grade_status: grade_status(assessment.as_ref()),
        lock_status: lock.lock_status,
        grade_data: grade_data(assessment),
        response: ResponseContent {
            text: submission.text,
            files: submission
                .files
                .into_iter()
                .map(|file| ResponseFile {
                    download_url: file.download_url,
                    description: file.description,
                    name: file.name,
                })
                .collect(),
        },
    }
}

pub(crate) fn status_fetch_response(
    assessment: Option<AssessmentInfo>,
    lock: &LockInfo,
) -> StatusFetchResponse {
    StatusFetchResponse {
        grade_status: grade_status(assessment.as_ref()),
        lock_status: lock.lock_status,
        grade_data: grade_data(assessment),
    }
}

pub(crate) fn lock_status_response(lock: &LockInfo) -> LockStatusResponse {
    LockStatusResponse { lock_status: lock.lock_status }
}

/// An ungraded submission still gets a well-formed, empty grade.
pub(crate) fn grade_data(assessment: Option<AssessmentInfo>) -> GradeDataResponse {
    let Some(assessment) = assessment else {
        return GradeDataResponse {
            score: None,
            overall_feedback: String::new(),
            criteria: Vec::new(),
        };
    };

    GradeDataResponse {
        score: assessment.score,
        overall_feedback: assessment.feedback,
        criteria: assessment
            .criteria
            .into_iter()
            .map(|criterion| GradedCriterionResponse {
                name: criterion.name,
                feedback: criterion.feedback,
                points: criterion.points,
                selected_option: criterion.option,
            })
            .collect(),
    }
}

fn grade_status(assessment: Option<&AssessmentInfo>) -> GradeStatus {
    if assessment.is_some() {
        GradeStatus::Graded
    } else {
        GradeStatus::Ungraded
    }
}

fn ora_metadata(ora: OraMetadata) -> OraMetadataResponse {
    OraMetadataResponse {
        name: ora.name,
        prompts: ora.prompts,
        kind: if ora.teams_enabled { "team" } else { "individual" },
        text_response_config: ora.text_response,
        file_upload_response_config: ora.file_upload_response,
    }
}

fn rubric_config(rubric: RubricConfig) -> RubricConfigResponse {
    RubricConfigResponse {
        feedback_prompt: rubric.feedback_prompt.unwrap_or_default(),
        criteria: rubric
            .criteria
            .into_iter()
            .map(|criterion| RubricCriterionResponse {
                name: criterion.name,
                label: criterion.label,
                description: criterion.prompt,
                feedback_enabled: criterion.feedback != FeedbackMode::Disabled,
                feedback_required: criterion.feedback == FeedbackMode::Required,
                options: criterion
                    .options
                    .into_iter()
                    .map(|option| RubricOptionResponse {
                        name: option.name,
                        label: option.label,
                        points: option.points,
                        explanation: option.explanation,
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AssessedCriterion, LockStatus, Score, SubmissionFile, WorkflowSummary};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn missing_assessment_yields_empty_ungraded_grade() {
        let response = status_fetch_response(None, &LockInfo::with_status(LockStatus::Unlocked));

        assert_eq!(response.grade_status, GradeStatus::Ungraded);
        assert_eq!(
            serde_json::to_value(&response.grade_data).unwrap(),
            json!({"score": null, "overallFeedback": "", "criteria": []})
        );
    }

    #[test]
    fn assessment_criteria_keep_order_and_nullable_fields() {
        let assessment = AssessmentInfo {
            feedback: "Good effort".to_string(),
            score: Some(Score { points_earned: 3, points_possible: 5 }),
            criteria: vec![
                AssessedCriterion {
                    name: "Ideas".to_string(),
                    feedback: "Clear".to_string(),
                    points: Some(3),
                    option: Some("Fair".to_string()),
                },
                AssessedCriterion {
                    name: "Notes".to_string(),
                    feedback: String::new(),
                    points: None,
                    option: None,
                },
            ],
        };

        let value = serde_json::to_value(grade_data(Some(assessment))).unwrap();

        assert_eq!(value["score"], json!({"pointsEarned": 3, "pointsPossible": 5}));
        assert_eq!(value["criteria"][0]["selectedOption"], "Fair");
        assert_eq!(value["criteria"][1]["name"], "Notes");
        assert_eq!(value["criteria"][1]["points"], serde_json::Value::Null);
    }

    #[test]
    fn submission_fetch_carries_response_files() {
        let submission = SubmissionInfo {
            text: vec!["Answer".to_string()],
            files: vec![SubmissionFile {
                download_url: "https://files.example/essay.pdf".to_string(),
                description: "Essay".to_string(),
                name: "essay.pdf".to_string(),
            }],
        };
        let lock = LockInfo::with_status(LockStatus::InProgress);

        let response = submission_fetch_response(submission, None, &lock);
        let value = serde_json::to_value(response).unwrap();

        assert_eq!(value["lockStatus"], "in-progress");
        assert_eq!(value["response"]["text"][0], "Answer");
        assert_eq!(value["response"]["files"][0]["downloadUrl"], "https://files.example/essay.pdf");
    }

    #[test]
    fn initialize_maps_team_units_and_feedback_modes() {
        let uuid = Uuid::new_v4();
        let workflows = WorkflowList::from([(
            uuid,
            WorkflowSummary {
                submission_uuid: uuid,
                username: None,
                team_name: Some("Blue".to_string()),
                date_submitted: None,
                date_graded: None,
                graded_by: None,
                grading_status: GradeStatus::Ungraded,
                lock_status: LockStatus::Locked,
                score: None,
            },
        )]);
        let rubric: RubricConfig = serde_json::from_value(json!({
            "criteria": [{
                "name": "Ideas",
                "prompt": "Are the ideas clear?",
                "feedback": "required"
            }]
        }))
        .unwrap();
        let ora = OraMetadata {
            name: "Team essay".to_string(),
            prompts: vec!["Write".to_string()],
            teams_enabled: true,
            text_response: Some("required".to_string()),
            file_upload_response: None,
        };
        let course = CourseMetadata {
            id: "course-v1:edX+DemoX+2024_T1".to_string(),
            name: "Demo course".to_string(),
            org: "edX".to_string(),
            number: "DemoX".to_string(),
        };

        let value =
            serde_json::to_value(initialize_response(ora, course, workflows, rubric)).unwrap();

        assert_eq!(value["oraMetadata"]["type"], "team");
        assert_eq!(value["courseMetadata"]["title"], "Demo course");
        assert_eq!(value["courseMetadata"]["courseId"], "course-v1:edX+DemoX+2024_T1");
        assert_eq!(value["submissions"][uuid.to_string()]["teamName"], "Blue");
        assert_eq!(value["submissions"][uuid.to_string()]["lockStatus"], "locked");
        assert_eq!(value["rubricConfig"]["feedbackPrompt"], "");
        assert_eq!(value["rubricConfig"]["criteria"][0]["description"], "Are the ideas clear?");
        assert_eq!(value["rubricConfig"]["criteria"][0]["feedbackEnabled"], true);
        assert_eq!(value["rubricConfig"]["criteria"][0]["feedbackRequired"], true);
    }
}
