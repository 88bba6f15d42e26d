use std::env;

use super::types::{AuthMethod, BackendMode, ConfigError, Environment};

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:1993",
    "http://localhost:18000",
    "http://localhost:2000",
];

const DEFAULT_AUTH_CHAIN: &[AuthMethod] =
    &[AuthMethod::Jwt, AuthMethod::Bearer, AuthMethod::Session];

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim().is_empty() {
        return Ok(default_cors_origins());
    }

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(default_cors_origins());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(default_cors_origins());
    }

    Ok(items)
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

pub(super) fn parse_backend_mode(value: Option<String>) -> Result<BackendMode, ConfigError> {
    match value.as_deref().map(|item| item.to_ascii_lowercase()) {
        None => Ok(BackendMode::Http),
        Some(ref val) if val == "http" => Ok(BackendMode::Http),
        Some(ref val) if val == "memory" || val == "in-memory" => Ok(BackendMode::Memory),
        Some(val) => Err(ConfigError::InvalidValue { field: "BACKEND_MODE", value: val }),
    }
}

/// Parses a comma separated, ordered list of authenticators. Duplicates keep
/// their first position.
pub(super) fn parse_auth_chain(value: Option<String>) -> Result<Vec<AuthMethod>, ConfigError> {
    let Some(raw) = value else {
        return Ok(DEFAULT_AUTH_CHAIN.to_vec());
    };

    let mut chain = Vec::new();
    for item in raw.split(',').map(|item| item.trim().to_ascii_lowercase()) {
        if item.is_empty() {
            continue;
        }
        let method = match item.as_str() {
            "jwt" => AuthMethod::Jwt,
            "bearer" => AuthMethod::Bearer,
            "session" => AuthMethod::Session,
            _ => return Err(ConfigError::InvalidValue { field: "AUTH_CHAIN", value: item }),
        };
        if !chain.contains(&method) {
            chain.push(method);
        }
    }

    if chain.is_empty() {
        return Err(ConfigError::InvalidValue { field: "AUTH_CHAIN", value: raw });
    }

    Ok(chain)
}

pub(super) fn normalize_prefix(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}
