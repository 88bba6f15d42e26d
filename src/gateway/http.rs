use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    AssessmentInfo, ContentCatalog, CourseMetadata, GatewayError, LockInfo, LockStatus,
    OraMetadata, RubricConfig, StaffAssessRequest, StaffAssessResponse, SubmissionBackend,
    SubmissionInfo, WorkflowList,
};
use crate::core::config::Settings;
use crate::core::metrics;
use crate::services::identity::StaffIdentity;
use crate::services::location::OraLocation;

const REQUESTER_HEADER: &str = "X-Staff-User-Id";

/// Talks to the LMS: XBlock JSON handlers for grading and locks, the course
/// and block APIs for metadata.
#[derive(Debug, Clone)]
pub(crate) struct HttpSubmissionBackend {
    client: Client,
    base_url: String,
    service_token: String,
}

#[derive(Debug, Deserialize)]
struct BlocksResponse {
    root: String,
    #[serde(default)]
    blocks: HashMap<String, BlockRecord>,
}

#[derive(Debug, Deserialize)]
struct BlockRecord {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    student_view_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CourseRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    org: String,
    #[serde(default)]
    number: String,
}

impl HttpSubmissionBackend {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = settings.backend();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(backend.connect_timeout_seconds))
            .timeout(Duration::from_secs(backend.timeout_seconds))
            .build()
            .context("Failed to build submission backend HTTP client")?;

        Ok(Self {
            client,
            base_url: backend.base_url.trim_end_matches('/').to_string(),
            service_token: backend.service_token.clone(),
        })
    }

    fn handler_url(&self, location: &OraLocation, handler: &str) -> String {
        format!(
            "{}/courses/{}/xblock/{}/handler/{}",
            self.base_url,
            location.course_key(),
            location.as_str(),
            handler
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.service_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.service_token)
        }
    }

    /// Sends one request and returns the status with the raw body. Transport
    /// failures and timing are recorded here.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), GatewayError> {
        let started = Instant::now();
        let response = self.authorize(request).send().await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                metrics::record_backend_call(operation, "transport_error", started.elapsed());
                return Err(GatewayError::Transport { operation, message: err.to_string() });
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|err| GatewayError::Transport {
            operation,
            message: format!("failed to read body: {err}"),
        });

        let outcome = if status.is_success() { "ok" } else { "error_status" };
        metrics::record_backend_call(operation, outcome, started.elapsed());
        tracing::debug!(operation, status = status.as_u16(), "backend call completed");

        Ok((status, body?))
    }

    /// A 404 names the submission when the call is about one, the unit otherwise.
    async fn call_handler(
        &self,
        operation: &'static str,
        location: &OraLocation,
        submission_uuid: Option<Uuid>,
        requester: &StaffIdentity,
        body: Value,
    ) -> Result<(StatusCode, String), GatewayError> {
        let request = self
            .client
            .post(self.handler_url(location, operation))
            .header(REQUESTER_HEADER, &requester.user_id)
            .json(&body);

        let (status, raw) = self.send(operation, request).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(match submission_uuid {
                Some(submission_uuid) => GatewayError::SubmissionNotFound(submission_uuid),
                None => GatewayError::UnitNotFound(location.to_string()),
            });
        }
        Ok((status, raw))
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        location: &OraLocation,
        submission_uuid: Option<Uuid>,
        requester: &StaffIdentity,
        body: Value,
    ) -> Result<T, GatewayError> {
        let (status, raw) =
            self.call_handler(operation, location, submission_uuid, requester, body).await?;
        if !status.is_success() {
            return Err(GatewayError::Status { operation, status: status.as_u16(), body: raw });
        }
        decode(operation, &raw)
    }

    /// Claim and delete answer non-2xx on contention; the body still carries
    /// the current lock info when the backend provides it.
    async fn call_lock_handler(
        &self,
        operation: &'static str,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        let body = json!({ "submission_uuid": submission_uuid });
        let (status, raw) = self
            .call_handler(operation, location, Some(submission_uuid), requester, body)
            .await?;

        if status.is_success() {
            return decode(operation, &raw);
        }

        if matches!(status, StatusCode::FORBIDDEN | StatusCode::CONFLICT) {
            let info = serde_json::from_str::<LockInfo>(&raw)
                .unwrap_or_else(|_| LockInfo::with_status(LockStatus::Locked));
            return Err(GatewayError::LockConflict(info));
        }

        Err(GatewayError::Status { operation, status: status.as_u16(), body: raw })
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, GatewayError> {
        let (status, raw) = self.send(operation, self.client.get(url).query(query)).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GatewayError::Status { operation, status: status.as_u16(), body: raw });
        }

        decode(operation, &raw).map(Some)
    }
}

#[async_trait]
impl SubmissionBackend for HttpSubmissionBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn list_workflows(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
    ) -> Result<WorkflowList, GatewayError> {
        self.call_json("list_staff_workflows", location, None, requester, json!({})).await
    }

    async fn get_rubric(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
    ) -> Result<RubricConfig, GatewayError> {
        let body = json!({ "target_rubric_block_id": location.as_str() });
        self.call_json("get_rubric", location, None, requester, body).await
    }

    async fn get_submission_info(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<SubmissionInfo, GatewayError> {
        let body = json!({ "submission_uuid": submission_uuid });
        self.call_json("get_submission_info", location, Some(submission_uuid), requester, body)
            .await
    }

    async fn get_assessment_info(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<Option<AssessmentInfo>, GatewayError> {
        let body = json!({ "submission_uuid": submission_uuid });
        let value: Value = self
            .call_json("get_assessment_info", location, Some(submission_uuid), requester, body)
            .await?;
        assessment_from_value(value)
    }

    async fn check_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        let body = json!({ "submission_uuid": submission_uuid });
        self.call_json("check_submission_lock", location, Some(submission_uuid), requester, body)
            .await
    }

    async fn claim_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        self.call_lock_handler("claim_submission_lock", location, submission_uuid, requester)
            .await
    }

    async fn delete_lock(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GatewayError> {
        self.call_lock_handler("delete_submission_lock", location, submission_uuid, requester)
            .await
    }

    async fn staff_assess(
        &self,
        location: &OraLocation,
        requester: &StaffIdentity,
        assessment: &StaffAssessRequest,
    ) -> Result<StaffAssessResponse, GatewayError> {
        let body = serde_json::to_value(assessment).map_err(|err| GatewayError::Decode {
            operation: "staff_assess",
            message: err.to_string(),
        })?;
        let submission_uuid = Some(assessment.submission_uuid);
        self.call_json("staff_assess", location, submission_uuid, requester, body).await
    }
}

#[async_trait]
impl ContentCatalog for HttpSubmissionBackend {
    async fn get_ora_metadata(
        &self,
        location: &OraLocation,
    ) -> Result<Option<OraMetadata>, GatewayError> {
        let url = format!("{}/api/courses/v1/blocks/{}", self.base_url, location.as_str());
        let response: Option<BlocksResponse> = self
            .get_optional(
                "get_block_metadata",
                url,
                &[("requested_fields", "display_name,student_view_data")],
            )
            .await?;

        Ok(response.and_then(ora_metadata_from_blocks))
    }

    async fn get_course_metadata(
        &self,
        course_key: &str,
    ) -> Result<Option<CourseMetadata>, GatewayError> {
        let url = format!("{}/api/courses/v1/courses/{}", self.base_url, course_key);
        let course: Option<CourseRecord> =
            self.get_optional("get_course_metadata", url, &[]).await?;

        Ok(course.map(|course| CourseMetadata {
            id: course.id,
            name: course.name,
            org: course.org,
            number: course.number,
        }))
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, raw: &str) -> Result<T, GatewayError> {
    serde_json::from_str(raw)
        .map_err(|err| GatewayError::Decode { operation, message: err.to_string() })
}

/// Ungraded submissions come back as an empty object.
fn assessment_from_value(value: Value) -> Result<Option<AssessmentInfo>, GatewayError> {
    match &value {
        Value::Null => return Ok(None),
        Value::Object(map) if map.is_empty() => return Ok(None),
        _ => {}
    }

    serde_json::from_value(value).map(Some).map_err(|err| GatewayError::Decode {
        operation: "get_assessment_info",
        message: err.to_string(),
    })
}

fn ora_metadata_from_blocks(response: BlocksResponse) -> Option<OraMetadata> {
    let mut blocks = response.blocks;
    let root = blocks.remove(&response.root)?;
    let data = root.student_view_data.unwrap_or(Value::Null);

    let prompts = data
        .get("prompts")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(prompt_text).collect())
        .unwrap_or_default();
    let text_field = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

    Some(OraMetadata {
        name: root.display_name,
        prompts,
        teams_enabled: data.get("teams_enabled").and_then(Value::as_bool).unwrap_or(false),
        text_response: text_field("text_response"),
        file_upload_response: text_field("file_upload_response"),
    })
}

fn prompt_text(item: &Value) -> Option<String> {
    match item {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map.get("description").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
