use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::gateway::{ContentCatalog, SubmissionBackend};
use crate::services::auth::AuthChain;
use crate::services::workflow::GradingWorkflow;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    redis: RedisHandle,
    backend_name: &'static str,
    workflow: GradingWorkflow,
    auth: AuthChain,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        redis: RedisHandle,
        backend: Arc<dyn SubmissionBackend>,
        catalog: Arc<dyn ContentCatalog>,
    ) -> Self {
        let auth = AuthChain::from_settings(&settings, &redis);
        let backend_name = backend.name();
        let workflow = GradingWorkflow::new(backend, catalog);

        Self { inner: Arc::new(InnerState { settings, redis, backend_name, workflow, auth }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn backend_name(&self) -> &'static str {
        self.inner.backend_name
    }

    pub(crate) fn workflow(&self) -> &GradingWorkflow {
        &self.inner.workflow
    }

    pub(crate) fn auth(&self) -> &AuthChain {
        &self.inner.auth
    }
}
