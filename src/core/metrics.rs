use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_backend_call(
    operation: &'static str,
    outcome: &'static str,
    elapsed: Duration,
) {
    metrics::counter!(
        "ora_backend_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("ora_backend_request_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}

pub(crate) fn record_lock_event(action: &'static str, outcome: &'static str) {
    metrics::counter!("ora_lock_events_total", "action" => action, "outcome" => outcome)
        .increment(1);
}

pub(crate) fn record_grade_submission(outcome: &'static str) {
    metrics::counter!("ora_grade_submissions_total", "outcome" => outcome).increment(1);
}
