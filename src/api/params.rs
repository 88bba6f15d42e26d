use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::services::location::OraLocation;

const ORA_LOCATION: &str = "oraLocation";
const SUBMISSION_UUID: &str = "submissionUUID";

/// Query string shared by every grading endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct GraderQuery {
    #[serde(rename = "oraLocation")]
    ora_location: Option<String>,
    #[serde(rename = "submissionUUID")]
    submission_uuid: Option<String>,
}

/// Undecodable query strings (duplicated keys, broken percent-encoding)
/// surface as `ERR_BAD_REQUEST` instead of axum's plain-text rejection.
#[async_trait]
impl<S> FromRequestParts<S> for GraderQuery
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<GraderQuery>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(query)
    }
}

impl GraderQuery {
    pub(crate) fn location(&self) -> Result<OraLocation, ApiError> {
        let [location] = require_params([(ORA_LOCATION, self.ora_location.as_deref())])?;
        parse_location(location)
    }

    pub(crate) fn submission(&self) -> Result<(OraLocation, Uuid), ApiError> {
        let [location, submission_uuid] = require_params([
            (ORA_LOCATION, self.ora_location.as_deref()),
            (SUBMISSION_UUID, self.submission_uuid.as_deref()),
        ])?;

        let submission_uuid = Uuid::parse_str(submission_uuid).map_err(|_| {
            ApiError::BadRequest(format!("{SUBMISSION_UUID} is not a valid UUID"))
        })?;
        Ok((parse_location(location)?, submission_uuid))
    }
}

/// Reports every missing parameter at once. Blank values count as missing.
pub(crate) fn require_params<'a, const N: usize>(
    params: [(&'static str, Option<&'a str>); N],
) -> Result<[&'a str; N], ApiError> {
    let missing: Vec<&str> = params
        .iter()
        .filter(|(_, value)| value.map_or(true, |value| value.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(ApiError::MissingParam(missing.join(", ")));
    }

    Ok(params.map(|(_, value)| value.unwrap_or_default().trim()))
}

fn parse_location(raw: &str) -> Result<OraLocation, ApiError> {
    OraLocation::parse(raw).map_err(|err| ApiError::BadLocation(err.to_string()))
}
