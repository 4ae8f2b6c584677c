//! Shared helpers for router-level tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;

use super::router::create_router_with_state;
use super::state::AppState;
use crate::config::CorsConfig;
use crate::domain::assistant::MockResumeAssistant;
use crate::domain::quota::{
    FixedClock, QuotaAction, QuotaPolicy, QuotaStore, UsageKey, UsagePeriod,
};
use crate::infrastructure::quota::{InMemoryQuotaStore, QuotaService};

const BOUNDARY: &str = "quota-test-boundary";

/// Router over the given store, with the clock pinned to January 2025
pub fn router_with(store: Arc<InMemoryQuotaStore>, assistant: MockResumeAssistant) -> Router {
    let service = QuotaService::new(store).with_clock(Arc::new(FixedClock::at_month(2025, 1)));
    let state = AppState::new(
        Arc::new(service),
        Arc::new(assistant),
        QuotaPolicy::default(),
    );

    create_router_with_state(state, &CorsConfig::default())
}

pub fn january_key(user_id: &str, action: QuotaAction) -> UsageKey {
    UsageKey::new(user_id, action, UsagePeriod::new(2025, 1))
}

/// Count stored for January 2025, 0 when no row exists
pub async fn usage_count(store: &InMemoryQuotaStore, user_id: &str, action: QuotaAction) -> u32 {
    store
        .find_record(&january_key(user_id, action))
        .await
        .unwrap()
        .map(|r| r.count)
        .unwrap_or(0)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// ATS upload with a `userId` field and an optional `resume` file
pub fn multipart_request(user_id: &str, file: Option<(&str, &str)>) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"userId\"\r\n\r\n{user_id}\r\n"
    );

    if let Some((file_name, content)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }

    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/analyze-resume-ats")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
