use crate::core::config::AuthMethod;

/// The authenticated staff member issuing a request. Lock ownership is
/// decided by the backend against `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StaffIdentity {
    pub(crate) user_id: String,
    pub(crate) username: Option<String>,
    pub(crate) method: AuthMethod,
}

impl StaffIdentity {
    pub(crate) fn new(
        user_id: impl Into<String>,
        username: Option<String>,
        method: AuthMethod,
    ) -> Self {
        Self { user_id: user_id.into(), username, method }
    }

    pub(crate) fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.user_id)
    }
}
