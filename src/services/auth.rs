//! Ordered authenticator chain. Each authenticator inspects only its own
//! credential kind; the first one that recognises a credential decides.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use thiserror::Error;

use crate::core::config::{AuthMethod, Settings};
use crate::core::redis::RedisHandle;
use crate::core::security;
use crate::services::identity::StaffIdentity;

const BEARER_KEY_PREFIX: &str = "auth:bearer:";
const SESSION_KEY_PREFIX: &str = "auth:session:";
const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Error)]
pub(crate) enum AuthError {
    #[error("{} credentials were rejected", .0.as_str())]
    Rejected(AuthMethod),
    #[error("no credentials presented")]
    Missing,
    #[error("credential store unavailable: {0}")]
    Store(String),
}

#[async_trait]
pub(crate) trait Authenticator: Send + Sync {
    fn method(&self) -> AuthMethod;

    /// `Ok(None)` when the request carries no credential of this kind.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<StaffIdentity>, AuthError>;
}

/// `Authorization: JWT <token>`, signed with the service secret.
pub(crate) struct JwtAuthenticator {
    settings: Settings,
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::Jwt
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<StaffIdentity>, AuthError> {
        let Some(token) = authorization_token(headers, "JWT ") else {
            return Ok(None);
        };

        let claims = security::verify_token(token, &self.settings)
            .map_err(|_| AuthError::Rejected(AuthMethod::Jwt))?;
        Ok(Some(StaffIdentity::new(claims.sub, claims.username, AuthMethod::Jwt)))
    }
}

/// `Authorization: Bearer <token>`; tokens are stored in Redis by digest.
pub(crate) struct BearerAuthenticator {
    redis: RedisHandle,
}

#[async_trait]
impl Authenticator for BearerAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::Bearer
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<StaffIdentity>, AuthError> {
        let Some(token) = authorization_token(headers, "Bearer ") else {
            return Ok(None);
        };

        let key = format!("{BEARER_KEY_PREFIX}{}", security::hash_bearer_token(token));
        lookup_user(&self.redis, &key, AuthMethod::Bearer).await.map(Some)
    }
}

/// Session cookie issued by the LMS, resolved through Redis.
pub(crate) struct SessionAuthenticator {
    redis: RedisHandle,
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    fn method(&self) -> AuthMethod {
        AuthMethod::Session
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<StaffIdentity>, AuthError> {
        let Some(session_id) = session_cookie(headers) else {
            return Ok(None);
        };

        let key = format!("{SESSION_KEY_PREFIX}{session_id}");
        lookup_user(&self.redis, &key, AuthMethod::Session).await.map(Some)
    }
}

#[derive(Clone)]
pub(crate) struct AuthChain {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AuthChain {
    pub(crate) fn from_settings(settings: &Settings, redis: &RedisHandle) -> Self {
        let authenticators = settings
            .auth()
            .chain
            .iter()
            .map(|method| -> Arc<dyn Authenticator> {
                match method {
                    AuthMethod::Jwt => Arc::new(JwtAuthenticator { settings: settings.clone() }),
                    AuthMethod::Bearer => Arc::new(BearerAuthenticator { redis: redis.clone() }),
                    AuthMethod::Session => Arc::new(SessionAuthenticator { redis: redis.clone() }),
                }
            })
            .collect();

        Self { authenticators }
    }

    pub(crate) fn methods(&self) -> Vec<AuthMethod> {
        self.authenticators.iter().map(|authenticator| authenticator.method()).collect()
    }

    /// A rejected credential stops the chain; it never falls through to a
    /// later authenticator.
    pub(crate) async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<StaffIdentity, AuthError> {
        for authenticator in &self.authenticators {
            if let Some(identity) = authenticator.authenticate(headers).await? {
                return Ok(identity);
            }
        }

        Err(AuthError::Missing)
    }
}

async fn lookup_user(
    redis: &RedisHandle,
    key: &str,
    method: AuthMethod,
) -> Result<StaffIdentity, AuthError> {
    let value = redis.get_string(key).await.map_err(|err| AuthError::Store(err.to_string()))?;
    let Some(value) = value else {
        return Err(AuthError::Rejected(method));
    };

    // Stored as `<user_id>` or `<user_id>:<username>`.
    let identity = match value.split_once(':') {
        Some((user_id, username)) if !username.is_empty() => {
            StaffIdentity::new(user_id, Some(username.to_string()), method)
        }
        Some((user_id, _)) => StaffIdentity::new(user_id, None, method),
        None => StaffIdentity::new(value, None, method),
    };

    if identity.user_id.is_empty() {
        return Err(AuthError::Rejected(method));
    }
    Ok(identity)
}

fn authorization_token<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(scheme))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
