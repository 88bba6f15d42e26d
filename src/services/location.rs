use std::fmt;

use thiserror::Error;

const USAGE_KEY_PREFIX: &str = "block-v1:";
const COURSE_KEY_PREFIX: &str = "course-v1:";
const ASSESSABLE_BLOCK_TYPE: &str = "openassessment";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum LocationError {
    #[error("location must start with 'block-v1:'")]
    MissingPrefix,
    #[error("location must have org, course, run, type and block segments")]
    MalformedSegments,
    #[error("invalid characters in {0}")]
    InvalidSegment(&'static str),
    #[error("block type '{0}' is not an open response assessment")]
    NotAssessable(String),
}

/// Usage key of an open response assessment block, e.g.
/// `block-v1:edX+DemoX+Demo_Course+type@openassessment+block@a1b2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct OraLocation {
    raw: String,
    org: String,
    course: String,
    run: String,
}

impl OraLocation {
    pub(crate) fn parse(raw: &str) -> Result<Self, LocationError> {
        let raw = raw.trim();
        let body = raw.strip_prefix(USAGE_KEY_PREFIX).ok_or(LocationError::MissingPrefix)?;

        let segments: Vec<&str> = body.split('+').collect();
        let [org, course, run, block_type, block_id] = segments.as_slice() else {
            return Err(LocationError::MalformedSegments);
        };

        let block_type =
            block_type.strip_prefix("type@").ok_or(LocationError::MalformedSegments)?;
        let block_id = block_id.strip_prefix("block@").ok_or(LocationError::MalformedSegments)?;

        check_segment("org", org, false)?;
        check_segment("course", course, false)?;
        check_segment("run", run, false)?;
        check_segment("block type", block_type, false)?;
        check_segment("block id", block_id, true)?;

        if block_type != ASSESSABLE_BLOCK_TYPE {
            return Err(LocationError::NotAssessable(block_type.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn course_key(&self) -> String {
        format!("{COURSE_KEY_PREFIX}{}+{}+{}", self.org, self.course, self.run)
    }
}

impl fmt::Display for OraLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn check_segment(name: &'static str, value: &str, allow_colon: bool) -> Result<(), LocationError> {
    let valid = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | '-' | '~' | '.')
                || (allow_colon && c == ':')
        });

    if valid {
        Ok(())
    } else {
        Err(LocationError::InvalidSegment(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATION: &str = "block-v1:edX+DemoX+Demo_Course+type@openassessment+block@6e1f2a";

    #[test]
    fn parses_usage_key_and_derives_course_key() {
        let location = OraLocation::parse(LOCATION).expect("location");

        assert_eq!(location.as_str(), LOCATION);
        assert_eq!(location.course_key(), "course-v1:edX+DemoX+Demo_Course");
    }

    #[test]
    fn rejects_non_usage_keys() {
        assert_eq!(OraLocation::parse("not-a-key"), Err(LocationError::MissingPrefix));
        assert_eq!(
            OraLocation::parse("block-v1:edX+DemoX+type@openassessment+block@x"),
            Err(LocationError::MalformedSegments)
        );
        assert_eq!(
            OraLocation::parse("block-v1:edX+Demo X+run+type@openassessment+block@x"),
            Err(LocationError::InvalidSegment("course"))
        );
    }

    #[test]
    fn rejects_blocks_that_are_not_assessments() {
        let result = OraLocation::parse("block-v1:edX+DemoX+Demo_Course+type@problem+block@abc");
        assert_eq!(result, Err(LocationError::NotAssessable("problem".to_string())));
    }
}
