//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use self::config::MetricsConfig;
pub use self::metrics::{
    create_metrics_router, init_metrics, record_http_request, record_quota_check,
    record_quota_increment, record_quota_increment_failure, PrometheusMetrics, QuotaCheckOutcome,
};
