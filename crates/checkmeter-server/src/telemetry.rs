//! Logging and metrics setup

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

pub const REQUESTS_TOTAL: &str = "checkmeter_requests_total";
pub const VERDICTS_TOTAL: &str = "checkmeter_verdicts_total";
pub const RETAKES_TOTAL: &str = "checkmeter_retakes_total";
pub const UPSTREAM_FAILURES_TOTAL: &str = "checkmeter_upstream_failures_total";
pub const QUOTA_REJECTIONS_TOTAL: &str = "checkmeter_quota_rejections_total";
pub const UPSTREAM_LATENCY_MS: &str = "checkmeter_upstream_latency_ms";

/// Initialize tracing/logging
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("checkmeter=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("checkmeter=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and return the handle used by `/metrics`
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(REQUESTS_TOTAL, "Requests received by endpoint");
    metrics::describe_counter!(VERDICTS_TOTAL, "Classification verdicts by tier and classification");
    metrics::describe_counter!(RETAKES_TOTAL, "Results withheld in favour of a new photo, by reason");
    metrics::describe_counter!(UPSTREAM_FAILURES_TOTAL, "Failed vision backend calls");
    metrics::describe_counter!(QUOTA_REJECTIONS_TOTAL, "Requests rejected by the daily quota, by tier");
    metrics::describe_histogram!(
        UPSTREAM_LATENCY_MS,
        metrics::Unit::Milliseconds,
        "Vision backend call latency in milliseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
