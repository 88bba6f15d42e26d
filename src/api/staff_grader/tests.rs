use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use crate::test_support::{self, TestContext};

async fn send(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    staff_id: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let authorization = staff_id.map(|id| test_support::jwt_header(id, ctx.state.settings()));
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, authorization.as_deref(), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

fn submission_uri(ctx: &TestContext, path: &str) -> String {
    test_support::grader_uri(path, &ctx.fixture.location, Some(ctx.fixture.submission_uuid))
}

#[tokio::test]
async fn requests_without_credentials_are_forbidden() {
    let ctx = test_support::setup_test_context().await;
    let uri = test_support::grader_uri("/initialize", &ctx.fixture.location, None);

    let (status, body) = send(&ctx, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["error"], "ERR_FORBIDDEN");

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, &uri, Some("Bearer unknown"), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_query_params_are_named() {
    let ctx = test_support::setup_test_context().await;

    let (status, body) =
        send(&ctx, Method::GET, "/api/ora_staff_grader/submission/status", Some("a"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "ERR_MISSING_PARAM");
    let detail = body["detail"].as_str().expect("detail");
    assert!(detail.contains("oraLocation") && detail.contains("submissionUUID"), "{detail}");
}

#[tokio::test]
async fn malformed_location_is_a_bad_ora_location() {
    let ctx = test_support::setup_test_context().await;

    let (status, body) = send(
        &ctx,
        Method::GET,
        "/api/ora_staff_grader/initialize?oraLocation=block-v1%3Anot-a-unit",
        Some("a"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "ERR_BAD_ORA_LOCATION");
}

#[tokio::test]
async fn undecodable_query_string_is_a_bad_request() {
    let ctx = test_support::setup_test_context().await;
    let uri = format!("{}&oraLocation=x", submission_uri(&ctx, "/submission/status"));

    let (status, body) = send(&ctx, Method::GET, &uri, Some("a"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "ERR_BAD_REQUEST");
    assert!(body["detail"].as_str().expect("detail").contains("oraLocation"), "{body}");
}

#[tokio::test]
async fn backend_read_failure_is_a_bad_gateway_without_partial_data() {
    let ctx = test_support::setup_test_context().await;
    ctx.fixture.backend.fail_read("get_submission_info");

    let (status, body) =
        send(&ctx, Method::GET, &submission_uri(&ctx, "/submission"), Some("a"), None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY, "response: {body}");
    assert_eq!(body["error"], "ERR_BACKEND_UNAVAILABLE");
    assert!(body.get("gradeData").is_none() && body.get("response").is_none(), "{body}");
}

#[tokio::test]
async fn initialize_returns_unit_course_rubric_and_submissions() {
    let ctx = test_support::setup_test_context().await;
    let uri = test_support::grader_uri("/initialize", &ctx.fixture.location, None);

    let (status, body) = send(&ctx, Method::GET, &uri, Some("a"), None).await;

    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["oraMetadata"]["name"], "Essay on photosynthesis");
    assert_eq!(body["oraMetadata"]["type"], "individual");
    assert_eq!(body["courseMetadata"]["courseId"], test_support::COURSE_KEY);
    assert_eq!(body["rubricConfig"]["feedbackPrompt"], "Overall comments");
    let submission = &body["submissions"][ctx.fixture.submission_uuid.to_string()];
    assert_eq!(submission["username"], "learner");
    assert_eq!(submission["gradeStatus"], "ungraded");
    assert_eq!(submission["lockStatus"], "unlocked");
}

#[tokio::test]
async fn fetch_submission_includes_response_text() {
    let ctx = test_support::setup_test_context().await;

    let (status, body) =
        send(&ctx, Method::GET, &submission_uri(&ctx, "/submission"), Some("a"), None).await;

    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["response"]["text"][0], test_support::RESPONSE_TEXT);
    assert_eq!(body["gradeData"], json!({"score": null, "overallFeedback": "", "criteria": []}));
}

#[tokio::test]
async fn unknown_submission_is_not_found() {
    let ctx = test_support::setup_test_context().await;
    let uri =
        test_support::grader_uri("/submission/status", &ctx.fixture.location, Some(Uuid::new_v4()));

    let (status, body) = send(&ctx, Method::GET, &uri, Some("a"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND, "response: {body}");
    assert_eq!(body["error"], "ERR_SUBMISSION_NOT_FOUND");
}

#[tokio::test]
async fn grading_hands_the_submission_to_the_next_grader() {
    let ctx = test_support::setup_test_context().await;
    let lock_uri = submission_uri(&ctx, "/submission/lock");

    let (status, body) = send(&ctx, Method::POST, &lock_uri, Some("a"), None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body, json!({"lockStatus": "in-progress"}));

    let (status, body) = send(&ctx, Method::POST, &lock_uri, Some("b"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["error"], "ERR_LOCK_CONTESTED");
    assert_eq!(body["lockStatus"], "locked");
    assert_eq!(body["lockOwner"], "a");

    let (status, body) = send(
        &ctx,
        Method::POST,
        &submission_uri(&ctx, "/submission/grade"),
        Some("a"),
        Some(test_support::valid_grade_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["gradeStatus"], "graded");
    assert_eq!(body["lockStatus"], "unlocked");
    assert_eq!(body["gradeData"]["score"], json!({"pointsEarned": 7, "pointsPossible": 9}));
    assert_eq!(body["gradeData"]["criteria"][0]["selectedOption"], "Good");
    assert_eq!(body["gradeData"]["criteria"][2]["points"], serde_json::Value::Null);

    let (status, body) = send(&ctx, Method::POST, &lock_uri, Some("b"), None).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body, json!({"lockStatus": "in-progress"}));
}

#[tokio::test]
async fn rejected_grade_reports_backend_message_and_keeps_lock() {
    let ctx = test_support::setup_test_context().await;

    let (status, _) =
        send(&ctx, Method::POST, &submission_uri(&ctx, "/submission/lock"), Some("a"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &ctx,
        Method::POST,
        &submission_uri(&ctx, "/submission/grade"),
        Some("a"),
        Some(json!({
            "overallFeedback": "Forgot a criterion",
            "criteria": [{"name": "Organization", "selectedOption": "Logical"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "ERR_GRADE_SUBMIT");
    assert!(body["detail"].as_str().expect("detail").contains("Ideas"), "response: {body}");

    let (status, body) =
        send(&ctx, Method::GET, &submission_uri(&ctx, "/submission/status"), Some("a"), None)
            .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["lockStatus"], "in-progress");
    assert_eq!(body["gradeStatus"], "ungraded");
}

#[tokio::test]
async fn grading_without_the_lock_is_contested() {
    let ctx = test_support::setup_test_context().await;

    let (status, body) = send(
        &ctx,
        Method::POST,
        &submission_uri(&ctx, "/submission/grade"),
        Some("a"),
        Some(test_support::valid_grade_body()),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["error"], "ERR_LOCK_CONTESTED");
    assert_eq!(body["lockStatus"], "unlocked");
}

#[tokio::test]
async fn malformed_grade_body_is_a_bad_request() {
    let ctx = test_support::setup_test_context().await;
    let grade_uri = submission_uri(&ctx, "/submission/grade");

    let (status, body) = send(
        &ctx,
        Method::POST,
        &grade_uri,
        Some("a"),
        Some(json!({"criteria": [{"name": "Ideas"}, {"name": "Ideas"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "ERR_BAD_REQUEST");

    let (status, body) =
        send(&ctx, Method::POST, &grade_uri, Some("a"), Some(json!({"criteria": "Ideas"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "ERR_BAD_REQUEST");
}

#[tokio::test]
async fn release_is_idempotent_and_guarded() {
    let ctx = test_support::setup_test_context().await;
    let lock_uri = submission_uri(&ctx, "/submission/lock");

    let (status, _) = send(&ctx, Method::POST, &lock_uri, Some("a"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&ctx, Method::DELETE, &lock_uri, Some("b"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["error"], "ERR_LOCK_CONTESTED");

    for _ in 0..2 {
        let (status, body) = send(&ctx, Method::DELETE, &lock_uri, Some("a"), None).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body, json!({"lockStatus": "unlocked"}));
    }
}
