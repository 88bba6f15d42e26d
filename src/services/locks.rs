use std::sync::Arc;

use uuid::Uuid;

use crate::core::metrics;
use crate::gateway::{LockInfo, LockStatus, SubmissionBackend};
use crate::services::error::GradingError;
use crate::services::identity::StaffIdentity;
use crate::services::location::OraLocation;

/// Enforces the lock ordering rules on top of the backend lock handlers.
/// Holds no lock state of its own.
#[derive(Clone)]
pub(crate) struct LockCoordinator {
    backend: Arc<dyn SubmissionBackend>,
}

impl LockCoordinator {
    pub(crate) fn new(backend: Arc<dyn SubmissionBackend>) -> Self {
        Self { backend }
    }

    pub(crate) async fn check(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GradingError> {
        Ok(self.backend.check_lock(location, submission_uuid, requester).await?)
    }

    /// Idempotent for the current holder; contested when anyone else holds it.
    pub(crate) async fn claim(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GradingError> {
        match self.backend.claim_lock(location, submission_uuid, requester).await {
            Ok(info) => {
                metrics::record_lock_event("claim", "granted");
                tracing::info!(
                    %location,
                    %submission_uuid,
                    requester = %requester.user_id,
                    lock_status = info.lock_status.as_str(),
                    "submission lock claimed"
                );
                Ok(info)
            }
            Err(err) => {
                let err = GradingError::from(err);
                if let GradingError::LockContested(info) = &err {
                    metrics::record_lock_event("claim", "contested");
                    tracing::info!(
                        %location,
                        %submission_uuid,
                        requester = %requester.user_id,
                        holder = info.owner_id.as_deref().unwrap_or("-"),
                        "submission lock claim contested"
                    );
                }
                Err(err)
            }
        }
    }

    /// Releasing an unlocked submission succeeds with `unlocked`.
    pub(crate) async fn release(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<LockInfo, GradingError> {
        let result = self.backend.delete_lock(location, submission_uuid, requester).await;
        let outcome = match &result {
            Ok(_) => "released",
            Err(crate::gateway::GatewayError::LockConflict(_)) => "contested",
            Err(_) => "error",
        };
        metrics::record_lock_event("release", outcome);
        tracing::info!(
            %location,
            %submission_uuid,
            requester = %requester.user_id,
            outcome,
            "submission lock release"
        );

        Ok(result?)
    }

    /// Fresh ownership check right before a grade commit. Never reuses an
    /// earlier answer.
    pub(crate) async fn ensure_held(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) -> Result<(), GradingError> {
        let info = self.check(location, submission_uuid, requester).await?;
        if info.lock_status == LockStatus::InProgress {
            return Ok(());
        }

        metrics::record_lock_event("ensure_held", "not_held");
        tracing::warn!(
            %location,
            %submission_uuid,
            requester = %requester.user_id,
            lock_status = info.lock_status.as_str(),
            "grade attempted without holding the submission lock"
        );
        Err(GradingError::LockContested(info))
    }

    /// Best-effort release once a grade is committed. A failure leaves the
    /// lock to the backend's own expiry.
    pub(crate) async fn release_after_grade(
        &self,
        location: &OraLocation,
        submission_uuid: Uuid,
        requester: &StaffIdentity,
    ) {
        if let Err(err) = self.release(location, submission_uuid, requester).await {
            metrics::record_lock_event("release_after_grade", "failed");
            tracing::warn!(
                error = %err,
                %location,
                %submission_uuid,
                requester = %requester.user_id,
                "failed to release submission lock after grading"
            );
        }
    }
}
