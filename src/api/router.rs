use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::cors::cors_layer;
use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::resume;
use super::state::AppState;
use super::usage;
use crate::config::CorsConfig;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Quota-gated resume endpoints
        .route("/analyze-resume-form", post(resume::analyze_resume_form))
        .route("/analyze-resume-ats", post(resume::analyze_resume_ats))
        .route(
            "/generate-high-ats-resume",
            post(resume::generate_high_ats_resume),
        )
        // Usage reporting
        .route("/usage-summary", get(usage::usage_summary))
        .route("/debug-usage", get(usage::debug_usage))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors_layer(cors))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::api::test_support::{get_request, read_json, router_with};
    use crate::domain::assistant::MockResumeAssistant;
    use crate::infrastructure::quota::InMemoryQuotaStore;

    #[tokio::test]
    async fn test_health_and_live() {
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), MockResumeAssistant::new());

        let health = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(read_json(health).await["status"], "healthy");

        let live = app.oneshot(get_request("/live")).await.unwrap();
        assert_eq!(live.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_reflects_store_availability() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), MockResumeAssistant::new());

        let ready = app.clone().oneshot(get_request("/ready")).await.unwrap();
        assert_eq!(ready.status(), StatusCode::OK);

        store.set_unavailable(true);
        let not_ready = app.oneshot(get_request("/ready")).await.unwrap();
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(read_json(not_ready).await["checks"][0]["name"], "quota_store");
    }

    #[tokio::test]
    async fn test_request_id_is_generated_and_echoed() {
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), MockResumeAssistant::new());

        let generated = app.clone().oneshot(get_request("/live")).await.unwrap();
        assert!(generated.headers().get("x-request-id").is_some());

        let request = Request::builder()
            .uri("/live")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let echoed = app.oneshot(request).await.unwrap();
        assert_eq!(echoed.headers().get("x-request-id").unwrap(), "req-42");
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_with_credentials() {
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), MockResumeAssistant::new());

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://campus-app.vercel.app")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://campus-app.vercel.app"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_cors_omits_headers_for_unknown_origin() {
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), MockResumeAssistant::new());

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
