//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;
use crate::domain::quota::QuotaAction;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("campus_quota_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Outcome of a quota gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheckOutcome {
    Allowed,
    Denied,
    Error,
}

impl QuotaCheckOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Error => "error",
        }
    }
}

/// Record the result of a quota check
pub fn record_quota_check(action: QuotaAction, outcome: QuotaCheckOutcome) {
    counter!(
        "quota_checks_total",
        "action" => action.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a successful usage increment and the path that applied it
pub fn record_quota_increment(action: QuotaAction, path: &'static str) {
    counter!(
        "quota_increments_total",
        "action" => action.as_str(),
        "path" => path
    )
    .increment(1);
}

/// Record a usage increment that failed after the gated operation succeeded
pub fn record_quota_increment_failure(action: QuotaAction) {
    counter!("quota_increment_failures_total", "action" => action.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_check_outcome_labels() {
        assert_eq!(QuotaCheckOutcome::Allowed.as_str(), "allowed");
        assert_eq!(QuotaCheckOutcome::Denied.as_str(), "denied");
        assert_eq!(QuotaCheckOutcome::Error.as_str(), "error");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_quota_check(QuotaAction::Analysis, QuotaCheckOutcome::Allowed);
        record_quota_increment(QuotaAction::Generation, "atomic");
        record_quota_increment_failure(QuotaAction::Analysis);
        record_http_request("GET", "/health", 200, Duration::from_millis(3));
    }
}
