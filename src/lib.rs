pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod gateway;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use crate::core::config::{BackendMode, Settings};
use crate::core::{redis::RedisHandle, state::AppState, telemetry};
use crate::gateway::{ContentCatalog, HttpSubmissionBackend, InMemoryBackend, SubmissionBackend};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(
            error = %err,
            "Failed to connect to Redis; bearer/session auth and claim throttling disabled"
        );
    } else {
        tracing::info!("Redis connected successfully");
    }

    let (backend, catalog) = build_backend(&settings)?;
    let state = AppState::new(settings, redis.clone(), backend, catalog);

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        backend = state.backend_name(),
        api_prefix = %state.settings().api().api_prefix,
        "ORA staff grader listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

fn build_backend(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn SubmissionBackend>, Arc<dyn ContentCatalog>)> {
    match settings.backend().mode {
        BackendMode::Http => {
            let backend = Arc::new(HttpSubmissionBackend::from_settings(settings)?);
            tracing::info!(
                base_url = %settings.backend().base_url,
                "Using HTTP submission backend"
            );
            let submissions: Arc<dyn SubmissionBackend> = backend.clone();
            let catalog: Arc<dyn ContentCatalog> = backend;
            Ok((submissions, catalog))
        }
        BackendMode::Memory => {
            let backend = match settings.backend().fixture_path.as_deref() {
                Some(path) => Arc::new(InMemoryBackend::from_fixture_file(Path::new(path))?),
                None => Arc::new(InMemoryBackend::new()),
            };
            tracing::warn!(
                fixture = settings.backend().fixture_path.as_deref().unwrap_or("-"),
                "Using in-memory submission backend; grades and locks are not persisted"
            );
            let submissions: Arc<dyn SubmissionBackend> = backend.clone();
            let catalog: Arc<dyn ContentCatalog> = backend;
            Ok((submissions, catalog))
        }
    }
}
