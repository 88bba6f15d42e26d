use std::collections::{BTreeMap, HashMap};
use std::path::Path;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::Mutex as SyncMutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AssessedCriterion, AssessmentInfo, ContentCatalog, CourseMetadata, FeedbackMode, GatewayError,
    GradeStatus, LockInfo, LockStatus, OraMetadata, RubricConfig, Score, StaffAssessRequest,
    StaffAssessResponse, SubmissionBackend, SubmissionInfo, WorkflowList, WorkflowSummary,
};
use crate::services::identity::StaffIdentity;
use crate::services::location::OraLocation;

/// Self-contained backend for local development and tests. A single mutex
/// guards all state, so every operation (claim included) is atomic.
#[derive(Default)]
pub(crate) struct InMemoryBackend {
    state: Mutex<MemoryState>,
    #[cfg(test)]
    fail_releases: AtomicBool,
    #[cfg(test)]
    failing_read: SyncMutex<Option<&'static str>>,
}

#[derive(Default)]
struct MemoryState {
    units: HashMap<String, UnitRecord>,
    courses: HashMap<String, CourseMetadata>,
    locks: HashMap<(String, Uuid), LockRecord>,
}

struct UnitRecord {
    metadata: OraMetadata,
    rubric: RubricConfig,
    submissions: BTreeMap<Uuid, SubmissionRecord>,
}

struct SubmissionRecord {
    username: Option<String>,
    team_name: Option<String>,
    date_submitted: Option<String>,
    info: SubmissionInfo,
    grade: Option<GradeRecord>,
}

struct GradeRecord {
    assessment: AssessmentInfo,
    graded_by: String,
    date_graded: String,
}

#[derive(Debug, Clone)]
struct LockRecord {
    owner_id: String,
}

/// JSON fixture accepted by [`InMemoryBackend::from_fixture_file`].
#[derive(Debug, Deserialize)]
pub(crate) struct Fixture {
    #[serde(default)]
    pub(crate) courses: Vec<CourseMetadata>,
    #[serde(default)]
    pub(crate) units: Vec<UnitFixture>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnitFixture {
    pub(crate) location: String,
    pub(crate) metadata: OraMetadata,
    #[serde(default)]
    pub(crate) rubric: RubricConfig,
    #[serde(default)]
    pub(crate) submissions: Vec<SubmissionFixture>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionFixture {
    pub(crate) uuid: Uuid,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) team_name: Option<String>,
    #[serde(default)]
    pub(crate) date_submitted: Option<String>,
    #[serde(default)]
    pub(crate) info: SubmissionInfo,
}

impl InMemoryBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fixture(fixture: Fixture) -> Result<Self> {
        let mut state = MemoryState::default();

        for course in fixture.courses {
            state.courses.insert(course.id.clone(), course);
        }

        for unit in fixture.units {
            let location = OraLocation::parse(&unit.location)
                .with_context(|| format!("invalid fixture location {}", unit.location))?;
            let submissions = unit
                .submissions
                .into_iter()
                .map(|submission| {
                    let record = SubmissionRecord {
                        username: submission.username,
                        team_name: submission.team_name,
                        date_submitted: submission.date_submitted,
                        info: submission.info,
                        grade: None,
                    };
                    (submission.uuid, record)
                })
                .collect();

            state.units.insert(
                location.as_str().to_string(),
                UnitRecord { metadata: unit.metadata, rubric: unit.rubric, submissions },
            );
        }

        Ok(Self { state: Mutex::new(state), ..Self::default() })
    }

    pub(crate) fn from_fixture_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read backend fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse backend fixture {}", path.display()))?;
        Self::from_fixture(fixture)
    }

    /// Registers a course in the catalog.
    pub(crate) async fn add_course(&self, course: CourseMetadata) {
        let mut state = self.state.lock().await;
        state.courses.insert(course.id.clone(), course);
    }

    /// Registers an assessable unit with its rubric.
    pub(crate) async fn add_unit(
        &self,
        location: &OraLocation,
        metadata: OraMetadata,
        rubric: RubricConfig,
    ) {
        let mut state = self.state.lock().await;
        state.units.insert(
            location.as_str().to_string(),
            UnitRecord { metadata, rubric, submissions: BTreeMap::new() },
        );
    }

    pub(crate) async fn add_submission(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        username: &str,
        info: SubmissionInfo,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        let unit = unit_mut(&mut state, location)?;
        unit.submissions.insert(
            submission_uuid,
            SubmissionRecord {
                username: Some(username.to_string()),
                team_name: None,
                date_submitted: Some(now_rfc3339()),
                info,
                grade: None,
            },
        );
        Ok(())
    }

    /// Makes every subsequent `delete_lock` fail at the transport level.
    #[cfg(test)]
    pub(crate) fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }

    /// Makes the named read operation fail at the transport level.
    #[cfg(test)]
    pub(crate) fn fail_read(&self, operation: &'static str) {
        *self.failing_read.lock().expect("failing read switch") = Some(operation);
    }

    #[cfg(test)]
    fn injected_read_failure(&self, operation: &'static str) -> Result<(), GatewayError> {
        if *self.failing_read.lock().expect("failing read switch") == Some(operation) {
            return Err(GatewayError::Transport {
                operation,
                message: "connection reset".to_string(),
            });
        }
        Ok(())
    }

    /// Drops a lock regardless of owner, as backend-side expiry would.
    #[cfg(test)]
    pub(crate) async fn expire_lock(&self, location: &OraLocation, submission_uuid: Uuid) {
        let mut state = self.state.lock().await;
        state.locks.remove(&lock_key(location, submission_uuid));
    }

    #[cfg(test)]
    pub(crate) async fn lock_owner(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
    ) -> Option<String> {
        let state = self.state.lock().await;
        state.locks.get(&lock_key(location, submission_uuid)).map(|lock| lock.owner_id.clone())
    }
}

#[async_trait]
impl SubmissionBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_workflows(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
    ) -> Result<WorkflowList, GatewayError> {
        #[cfg(test)]
        self.injected_read_failure("list_staff_workflows")?;

        let state = self.state.lock().await;
        let unit = unit_ref(&state, location)?;

        let workflows = unit
            .submissions
            .iter()
            .map(|(uuid, submission)| {
                let lock = state.locks.get(&lock_key(location, *uuid));
                let grade = submission.grade.as_ref();
                let summary = WorkflowSummary {
                    submission_uuid: *uuid,
                    username: submission.username.clone(),
                    team_name: submission.team_name.clone(),
                    date_submitted: submission.date_submitted.clone(),
                    date_graded: grade.map(|grade| grade.date_graded.clone()),
                    graded_by: grade.map(|grade| grade.graded_by.clone()),
                    grading_status: if grade.is_some() {
                        GradeStatus::Graded
                    } else {
                        GradeStatus::Ungraded
                    },
                    lock_status: lock_info(lock, requester).lock_status,
                    score: grade.and_then(|grade| grade.assessment.score),
                };
                (*uuid, summary)
            })
            .collect();

        Ok(workflows)
    }

    async fn get_rubric(
        &self,
        location: &OraLocation,
        _requester: &StaffIdentity,
    ) -> Result<RubricConfig, GatewayError> {
        #[cfg(test)]
        self.injected_read_failure("get_rubric")?;

        let state = self.state.lock().await;
        Ok(unit_ref(&state, location)?.rubric.clone())
    }

    async fn get_submission_info(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        _requester: &StaffIdentity,
    ) -> Result<SubmissionInfo, GatewayError> {
        #[cfg(test)]
        self.injected_read_failure("get_submission_info")?;

        let state = self.state.lock().await;
        Ok(submission_ref(&state, location, submission_uuid)?.info.clone())
    }

    async fn get_assessment_info(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        _requester: &StaffIdentity,
    ) -> Result<Option<AssessmentInfo>, GatewayError> {
        #[cfg(test)]
        self.injected_read_failure("get_assessment_info")?;

        let state = self.state.lock().await;
        let submission = submission_ref(&state, location, submission_uuid)?;
        Ok(submission.grade.as_ref().map(|grade| grade.assessment.clone()))
    }

    async fn check_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        let state = self.state.lock().await;
        submission_ref(&state, location, submission_uuid)?;
        Ok(lock_info(state.locks.get(&lock_key(location, submission_uuid)), requester))
    }

    async fn claim_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        let mut state = self.state.lock().await;
        submission_ref(&state, location, submission_uuid)?;

        let key = lock_key(location, submission_uuid);
        if let Some(existing) = state.locks.get(&key) {
            let info = lock_info(Some(existing), requester);
            if info.lock_status == LockStatus::Locked {
                return Err(GatewayError::LockConflict(info));
            }
            return Ok(info);
        }

        let record = LockRecord { owner_id: requester.user_id.clone() };
        let info = lock_info(Some(&record), requester);
        state.locks.insert(key, record);
        Ok(info)
    }

    async fn delete_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        #[cfg(test)]
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport {
                operation: "delete_submission_lock",
                message: "connection reset".to_string(),
            });
        }

        let mut state = self.state.lock().await;
        submission_ref(&state, location, submission_uuid)?;

        let key = lock_key(location, submission_uuid);
        let info = lock_info(state.locks.get(&key), requester);
        match info.lock_status {
            LockStatus::Locked => Err(GatewayError::LockConflict(info)),
            LockStatus::InProgress => {
                state.locks.remove(&key);
                Ok(LockInfo::with_status(LockStatus::Unlocked))
            }
            LockStatus::Unlocked => Ok(info),
        }
    }

    async fn staff_assess(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
        assessment: &StaffAssessRequest,
    ) -> Result<StaffAssessResponse, GatewayError> {
        let mut state = self.state.lock().await;
        submission_ref(&state, location, assessment.submission_uuid)?;
        let unit = unit_mut(&mut state, location)?;

        let assessed = match score_assessment(&unit.rubric, assessment) {
            Ok(assessed) => assessed,
            Err(msg) => return Ok(StaffAssessResponse { success: false, msg }),
        };

        let submission = unit
            .submissions
            .get_mut(&assessment.submission_uuid)
            .ok_or(GatewayError::SubmissionNotFound(assessment.submission_uuid))?;
        submission.grade = Some(GradeRecord {
            assessment: assessed,
            graded_by: requester.display_name().to_string(),
            date_graded: now_rfc3339(),
        });

        Ok(StaffAssessResponse { success: true, msg: String::new() })
    }
}

#[async_trait]
impl ContentCatalog for InMemoryBackend {
    async fn get_ora_metadata(
        &self,
        location: &OraLocation,
    ) -> Result<Option<OraMetadata>, GatewayError> {
        let state = self.state.lock().await;
        Ok(state.units.get(location.as_str()).map(|unit| unit.metadata.clone()))
    }

    async fn get_course_metadata(
        &self,
        course_key: &str,
    ) -> Result<Option<CourseMetadata>, GatewayError> {
        let state = self.state.lock().await;
        Ok(state.courses.get(course_key).cloned())
    }
}

/// Applies the rubric to a staff assessment, mirroring the validation the
/// real backend performs. `Err` carries the rejection message.
fn score_assessment(
    rubric: &RubricConfig,
    assessment: &StaffAssessRequest,
) -> Result<AssessmentInfo, String> {
    for name in assessment.options_selected.keys().chain(assessment.criterion_feedback.keys()) {
        if !rubric.criteria.iter().any(|criterion| &criterion.name == name) {
            return Err(format!("Unknown criterion '{name}'"));
        }
    }

    let mut earned = 0;
    let mut possible = 0;
    let mut criteria = Vec::with_capacity(rubric.criteria.len());

    for criterion in &rubric.criteria {
        let feedback =
            assessment.criterion_feedback.get(&criterion.name).cloned().unwrap_or_default();
        if criterion.feedback == FeedbackMode::Required && feedback.trim().is_empty() {
            return Err(format!("Feedback is required for criterion '{}'", criterion.name));
        }

        if criterion.is_feedback_only() {
            criteria.push(AssessedCriterion {
                name: criterion.name.clone(),
                feedback,
                points: None,
                option: None,
            });
            continue;
        }

        let Some(selected) = assessment.options_selected.get(&criterion.name) else {
            return Err(format!("An option must be selected for criterion '{}'", criterion.name));
        };
        let Some(option) = criterion.options.iter().find(|option| &option.name == selected) else {
            return Err(format!(
                "Option '{selected}' does not exist for criterion '{}'",
                criterion.name
            ));
        };

        earned += option.points;
        possible += criterion.max_points();
        criteria.push(AssessedCriterion {
            name: criterion.name.clone(),
            feedback,
            points: Some(option.points),
            option: Some(option.name.clone()),
        });
    }

    Ok(AssessmentInfo {
        feedback: assessment.overall_feedback.clone(),
        score: Some(Score { points_earned: earned, points_possible: possible }),
        criteria,
    })
}

fn lock_key(location: &OraLocation, submission_uuid: Uuid) -> (String, Uuid) {
    (location.as_str().to_string(), submission_uuid)
}

fn lock_info(lock: Option<&LockRecord>, requester: &StaffIdentity) -> LockInfo {
    match lock {
        None => LockInfo::with_status(LockStatus::Unlocked),
        Some(lock) => LockInfo {
            lock_status: if lock.owner_id == requester.user_id {
                LockStatus::InProgress
            } else {
                LockStatus::Locked
            },
            owner_id: Some(lock.owner_id.clone()),
        },
    }
}

fn unit_ref<'a>(
    state: &'a MemoryState,
    location: &OraLocation,
) -> Result<&'a UnitRecord, GatewayError> {
    state
        .units
        .get(location.as_str())
        .ok_or_else(|| GatewayError::UnitNotFound(location.to_string()))
}

fn unit_mut<'a>(
    state: &'a mut MemoryState,
    location: &OraLocation,
) -> Result<&'a mut UnitRecord, GatewayError> {
    state
        .units
        .get_mut(location.as_str())
        .ok_or_else(|| GatewayError::UnitNotFound(location.to_string()))
}

fn submission_ref<'a>(
    state: &'a MemoryState,
    location: &OraLocation,
    submission_uuid: Uuid,
) -> Result<&'a SubmissionRecord, GatewayError> {
    unit_ref(state, location)?
        .submissions
        .get(&submission_uuid)
        .ok_or(GatewayError::SubmissionNotFound(submission_uuid))
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
