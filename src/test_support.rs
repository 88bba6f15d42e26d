use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::config::{AuthMethod, Settings};
use crate::core::{redis::RedisHandle, security, state::AppState};
use crate::gateway::{
    CourseMetadata, FeedbackMode, InMemoryBackend, OraMetadata, RubricConfig, RubricCriterion,
    RubricOption, SubmissionInfo,
};
use crate::services::identity::StaffIdentity;
use crate::services::location::OraLocation;
use crate::services::locks::LockCoordinator;
use crate::services::workflow::GradingWorkflow;

const TEST_SECRET_KEY: &str = "test-secret";
const TEST_REDIS_DB: &str = "1";

pub(crate) const COURSE_KEY: &str = "course-v1:edX+DemoX+2024_T1";
pub(crate) const ORA_LOCATION: &str =
    "block-v1:edX+DemoX+2024_T1+type@openassessment+block@essay1";
pub(crate) const RESPONSE_TEXT: &str = "Photosynthesis turns light into chemical energy.";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) fixture: GradingFixture,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("ORA_GRADER_ENV", "test");
    std::env::set_var("ORA_GRADER_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("BACKEND_MODE", "memory");
    std::env::remove_var("BACKEND_FIXTURE_PATH");
    std::env::remove_var("BACKEND_SERVICE_TOKEN");
    std::env::remove_var("API_PREFIX");
    std::env::remove_var("AUTH_CHAIN");
    std::env::set_var("REDIS_HOST", "127.0.0.1");
    std::env::set_var("REDIS_PORT", "6379");
    std::env::set_var("REDIS_DB", TEST_REDIS_DB);
    std::env::remove_var("REDIS_PASSWORD");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
}

/// Router over an in-memory backend. Redis stays disconnected, so claim
/// throttling fails open and only JWT credentials can authenticate.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let (state, fixture) = memory_state(settings).await;
    let app = api::router::router(state.clone());

    TestContext { state, app, fixture, _guard: guard }
}

pub(crate) async fn memory_state(settings: Settings) -> (AppState, GradingFixture) {
    let fixture = GradingFixture::new().await;
    let redis = RedisHandle::new(settings.redis().redis_url());
    let state = AppState::new(settings, redis, fixture.backend.clone(), fixture.backend.clone());
    (state, fixture)
}

/// One unit in one course with a single ungraded submission.
pub(crate) struct GradingFixture {
    pub(crate) backend: Arc<InMemoryBackend>,
    pub(crate) location: OraLocation,
    pub(crate) submission_uuid: Uuid,
}

impl GradingFixture {
    pub(crate) async fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let location = OraLocation::parse(ORA_LOCATION).expect("fixture location");
        let submission_uuid = Uuid::new_v4();

        backend.add_course(course()).await;
        backend.add_unit(&location, ora_metadata(), rubric()).await;
        backend
            .add_submission(
                &location,
                submission_uuid,
                "learner",
                SubmissionInfo { text: vec![RESPONSE_TEXT.to_string()], files: Vec::new() },
            )
            .await
            .expect("fixture submission");

        Self { backend, location, submission_uuid }
    }

    pub(crate) fn locks(&self) -> LockCoordinator {
        LockCoordinator::new(self.backend.clone())
    }

    pub(crate) fn workflow(&self) -> GradingWorkflow {
        GradingWorkflow::new(self.backend.clone(), self.backend.clone())
    }
}

pub(crate) fn staff(user_id: &str) -> StaffIdentity {
    StaffIdentity::new(user_id, None, AuthMethod::Jwt)
}

pub(crate) fn course() -> CourseMetadata {
    CourseMetadata {
        id: COURSE_KEY.to_string(),
        name: "Demonstration Course".to_string(),
        org: "edX".to_string(),
        number: "DemoX".to_string(),
    }
}

pub(crate) fn ora_metadata() -> OraMetadata {
    OraMetadata {
        name: "Essay on photosynthesis".to_string(),
        prompts: vec!["Explain photosynthesis in your own words.".to_string()],
        teams_enabled: false,
        text_response: Some("required".to_string()),
        file_upload_response: None,
    }
}

/// Ideas (0/3/5), Organization (0/2/4) and a feedback-only Notes criterion.
pub(crate) fn rubric() -> RubricConfig {
    RubricConfig {
        feedback_prompt: Some("Overall comments".to_string()),
        criteria: vec![
            criterion("Ideas", FeedbackMode::Optional, &[("Poor", 0), ("Fair", 3), ("Good", 5)]),
            criterion(
                "Organization",
                FeedbackMode::Disabled,
                &[("Disorganized", 0), ("Adequate", 2), ("Logical", 4)],
            ),
            criterion("Notes", FeedbackMode::Optional, &[]),
        ],
    }
}

fn criterion(name: &str, feedback: FeedbackMode, options: &[(&str, u32)]) -> RubricCriterion {
    RubricCriterion {
        name: name.to_string(),
        label: name.to_string(),
        prompt: format!("How is the {}?", name.to_lowercase()),
        feedback,
        options: options
            .iter()
            .map(|(option, points)| RubricOption {
                name: option.to_string(),
                label: option.to_string(),
                points: *points,
                explanation: String::new(),
            })
            .collect(),
    }
}

/// Scores 7 of 9 against [`rubric`].
pub(crate) fn valid_grade_body() -> serde_json::Value {
    serde_json::json!({
        "overallFeedback": "Solid work",
        "criteria": [
            {"name": "Ideas", "feedback": "Clear thesis", "selectedOption": "Good"},
            {"name": "Organization", "selectedOption": "Adequate"},
            {"name": "Notes", "feedback": "Cite your sources"}
        ]
    })
}

pub(crate) fn jwt_header(user_id: &str, settings: &Settings) -> String {
    let token =
        security::create_access_token(user_id, None, settings, time::Duration::minutes(5))
            .expect("token");
    format!("JWT {token}")
}

pub(crate) fn grader_uri(
    path: &str,
    location: &OraLocation,
    submission_uuid: Option<Uuid>,
) -> String {
    let location = encode_query_value(location.as_str());
    let mut uri = format!("/api/ora_staff_grader{path}?oraLocation={location}");
    if let Some(submission_uuid) = submission_uuid {
        uri.push_str(&format!("&submissionUUID={submission_uuid}"));
    }
    uri
}

fn encode_query_value(value: &str) -> String {
    value.replace(':', "%3A").replace('+', "%2B").replace('@', "%40")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
