//! Usage reporting endpoints

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::resume::require_user_id;
use super::state::AppState;
use super::types::{ApiError, Json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `GET /usage-summary?userId=`
pub async fn usage_summary(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user_id(query.user_id.as_deref())?;

    let summary = state
        .quota_service
        .usage_summary(user_id, &state.policy)
        .await
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "Usage summary failed");
            ApiError::internal("Failed to fetch usage summary")
        })?;

    Ok(Json(json!({
        "success": true,
        "summary": summary,
    })))
}

/// `GET /debug-usage?userId=`: every stored row for the user
pub async fn debug_usage(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user_id(query.user_id.as_deref())?;

    let records = state.quota_service.list_records(user_id).await.map_err(|e| {
        error!(user_id = %user_id, error = %e, "Usage listing failed");
        ApiError::internal(e.to_string())
    })?;

    Ok(Json(json!({
        "success": true,
        "records": records,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::test_support::{get_request, january_key, read_json, router_with};
    use crate::domain::assistant::MockResumeAssistant;
    use crate::domain::quota::{QuotaAction, UsageKey, UsagePeriod, UsageRecord};
    use crate::infrastructure::quota::InMemoryQuotaStore;

    #[tokio::test]
    async fn test_usage_summary_reports_used_limit_remaining() {
        let store = Arc::new(InMemoryQuotaStore::new().with_record(
            UsageRecord::new(&january_key("u-1", QuotaAction::Analysis)).with_count(2),
        ));
        let app = router_with(store.clone(), MockResumeAssistant::new());

        let response = app
            .oneshot(get_request("/usage-summary?userId=u-1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({
                "success": true,
                "summary": {
                    "analysis": {"used": 2, "limit": 3, "remaining": 1},
                    "generation": {"used": 0, "limit": 2, "remaining": 2}
                }
            })
        );
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn test_usage_summary_clamps_remaining_at_zero() {
        let store = Arc::new(InMemoryQuotaStore::new().with_record(
            UsageRecord::new(&january_key("u-1", QuotaAction::Generation)).with_count(5),
        ));
        let app = router_with(store, MockResumeAssistant::new());

        let body = read_json(
            app.oneshot(get_request("/usage-summary?userId=u-1"))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(body["summary"]["generation"]["remaining"], 0);
        assert_eq!(body["summary"]["generation"]["used"], 5);
    }

    #[tokio::test]
    async fn test_usage_summary_requires_user_id() {
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), MockResumeAssistant::new());

        let response = app.oneshot(get_request("/usage-summary")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "Missing userId");
    }

    #[tokio::test]
    async fn test_usage_summary_outage_is_server_error() {
        let store = Arc::new(InMemoryQuotaStore::new());
        store.set_unavailable(true);
        let app = router_with(store, MockResumeAssistant::new());

        let response = app
            .oneshot(get_request("/usage-summary?userId=u-1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            json!({"success": false, "error": "Failed to fetch usage summary"})
        );
    }

    #[tokio::test]
    async fn test_debug_usage_lists_newest_first() {
        let older = UsageKey::new("u-1", QuotaAction::Analysis, UsagePeriod::new(2024, 12));
        let store = Arc::new(
            InMemoryQuotaStore::new()
                .with_record(UsageRecord::new(&older).with_count(3))
                .with_record(
                    UsageRecord::new(&january_key("u-1", QuotaAction::Analysis)).with_count(1),
                ),
        );
        let app = router_with(store, MockResumeAssistant::new());

        let body = read_json(
            app.oneshot(get_request("/debug-usage?userId=u-1"))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(body["success"], true);
        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["year"], 2025);
        assert_eq!(records[1]["year"], 2024);
        assert_eq!(records[1]["count"], 3);
    }
}
