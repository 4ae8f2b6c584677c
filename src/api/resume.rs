//! Quota-gated resume endpoints
//!
//! Every handler follows the same order: validate `userId`, check the
//! monthly limit (fail closed), call the assistant, then record the use
//! (fail open). The check and the increment are separate store calls, so two
//! concurrent requests at `limit - 1` can both pass the gate.

use axum::extract::{Multipart, State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::state::AppState;
use super::types::{ApiError, Json};
use crate::domain::assistant::{
    enhance_resume_fallback, extract_json_object, fallback_form_analysis, fallback_text_analysis,
    format_resume_for_analysis, merge_generated_resume, scanned_document_analysis,
    MIN_EXTRACTED_TEXT_LEN,
};
use crate::domain::quota::{validate_user_id, QuotaAction};
use crate::infrastructure::observability::{
    record_quota_check, record_quota_increment_failure, QuotaCheckOutcome,
};

/// Body of the JSON resume endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub resume_data: Option<Value>,
}

/// `POST /analyze-resume-form`
pub async fn analyze_resume_form(
    State(state): State<AppState>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user_id(request.user_id.as_deref())?;
    ensure_within_limit(&state, user_id, QuotaAction::Analysis).await?;

    let resume_data = request
        .resume_data
        .ok_or_else(|| ApiError::bad_request("Resume data is required"))?;

    info!(user_id = %user_id, "Analyzing form resume");

    let resume_text = format_resume_for_analysis(&resume_data);
    let raw = state.assistant.analyze_resume(&resume_text).await?;

    let analysis = extract_json_object(&raw).unwrap_or_else(|| {
        warn!(user_id = %user_id, "Unparseable analysis reply, using heuristic analysis");
        fallback_form_analysis(&resume_data, &raw)
    });

    record_successful_use(&state, user_id, QuotaAction::Analysis).await;

    Ok(Json(json!({
        "success": true,
        "analysis": analysis,
        "rawResponse": raw,
    })))
}

/// Fields collected from the ATS upload form
#[derive(Debug, Default)]
struct AtsUpload {
    user_id: Option<String>,
    file_name: Option<String>,
    text: Option<String>,
    size: usize,
}

async fn read_ats_upload(multipart: &mut Multipart) -> Result<AtsUpload, ApiError> {
    let mut upload = AtsUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().map(str::to_string);

        match name.as_deref() {
            Some("userId") => {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read userId: {}", e))
                })?;
                upload.user_id = Some(value);
            }
            Some("resume") => {
                let file_name = field.file_name().unwrap_or("resume").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read file '{}': {}", file_name, e))
                })?;

                upload.size = bytes.len();
                // Binary uploads carry no extractable text.
                upload.text = Some(String::from_utf8(bytes.to_vec()).unwrap_or_default());
                upload.file_name = Some(file_name);
            }
            Some("resumeText") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read resumeText: {}", e))
                })?;

                upload.size = text.len();
                upload.text = Some(text);
                upload.file_name.get_or_insert_with(|| "resume.txt".to_string());
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    Ok(upload)
}

/// `POST /analyze-resume-ats`
pub async fn analyze_resume_ats(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let upload = read_ats_upload(&mut multipart).await?;

    let user_id = require_user_id(upload.user_id.as_deref())?;
    ensure_within_limit(&state, user_id, QuotaAction::Analysis).await?;

    let text = upload
        .text
        .ok_or_else(|| ApiError::bad_request("Resume file is required"))?;
    let file_name = upload.file_name.unwrap_or_default();
    let extracted_len = text.trim().len();

    if extracted_len < MIN_EXTRACTED_TEXT_LEN {
        info!(
            user_id = %user_id,
            file_name = %file_name,
            extracted_len,
            "No usable text in upload, returning scanned document analysis"
        );

        let analysis = scanned_document_analysis(&file_name, upload.size);
        record_successful_use(&state, user_id, QuotaAction::Analysis).await;

        return Ok(Json(json!({
            "success": true,
            "analysis": analysis,
            "source": "fallback_scanned_analysis",
            "extractedTextLength": extracted_len,
            "warning": "Document appears to be scanned/image-based - analysis based on best practices",
        })));
    }

    info!(user_id = %user_id, file_name = %file_name, extracted_len, "Analyzing uploaded resume");

    let raw = state.assistant.analyze_resume(&text).await?;
    let analysis = extract_json_object(&raw).unwrap_or_else(|| {
        warn!(user_id = %user_id, "Unparseable analysis reply, using generic analysis");
        fallback_text_analysis(&raw)
    });

    record_successful_use(&state, user_id, QuotaAction::Analysis).await;

    Ok(Json(json!({
        "success": true,
        "analysis": analysis,
        "source": "ai_analysis",
        "extractedTextLength": extracted_len,
    })))
}

/// `POST /generate-high-ats-resume`
pub async fn generate_high_ats_resume(
    State(state): State<AppState>,
    Json(request): Json<ResumeRequest>,
) -> Result<Json<Value>, ApiError> {
    let user_id = require_user_id(request.user_id.as_deref())?;
    ensure_within_limit(&state, user_id, QuotaAction::Generation).await?;

    let resume_data = request
        .resume_data
        .ok_or_else(|| ApiError::bad_request("Resume data is required"))?;

    info!(user_id = %user_id, "Generating high-ATS resume");

    let raw = state.assistant.generate_resume(&resume_data).await?;

    let enhanced = match extract_json_object(&raw) {
        Some(generated) => merge_generated_resume(&resume_data, &generated),
        None => {
            warn!(user_id = %user_id, "Unparseable generation reply, enhancing input instead");
            enhance_resume_fallback(&resume_data)
        }
    };

    record_successful_use(&state, user_id, QuotaAction::Generation).await;

    Ok(Json(json!({
        "success": true,
        "enhancedResumeData": enhanced,
        "atsScore": 92,
        "improvements": [
            "Enhanced with industry-standard keywords and metrics",
            "Optimized bullet points with quantifiable achievements",
            "Added technical skills in ATS-friendly categorized format"
        ],
        "rawResponse": raw,
    })))
}

pub(crate) fn require_user_id(user_id: Option<&str>) -> Result<&str, ApiError> {
    let user_id = user_id.unwrap_or_default();
    validate_user_id(user_id).map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(user_id)
}

/// Quota gate. Store failures deny the request.
async fn ensure_within_limit(
    state: &AppState,
    user_id: &str,
    action: QuotaAction,
) -> Result<(), ApiError> {
    let limit = state.policy.limit_for(action);

    match state.quota_service.check_limit(user_id, action, limit).await {
        Ok(true) => {
            record_quota_check(action, QuotaCheckOutcome::Allowed);
            Ok(())
        }
        Ok(false) => {
            record_quota_check(action, QuotaCheckOutcome::Denied);
            info!(user_id = %user_id, action = %action, limit, "Monthly limit reached");
            Err(ApiError::rate_limited(state.policy.limit_message(action)))
        }
        Err(e) => {
            record_quota_check(action, QuotaCheckOutcome::Error);
            error!(user_id = %user_id, action = %action, error = %e, "Usage check failed");
            Err(ApiError::internal("Failed to verify usage"))
        }
    }
}

/// Count a completed operation. Failures are logged, never surfaced.
async fn record_successful_use(state: &AppState, user_id: &str, action: QuotaAction) {
    match state.quota_service.increment_usage(user_id, action).await {
        Ok(record) => {
            debug!(user_id = %user_id, action = %action, count = record.count, "Usage recorded");
        }
        Err(e) => {
            record_quota_increment_failure(action);
            error!(
                user_id = %user_id,
                action = %action,
                error = %e,
                "Failed to record usage after successful operation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::api::test_support::{
        january_key, json_request, multipart_request, read_json, router_with, usage_count,
    };
    use crate::domain::assistant::MockResumeAssistant;
    use crate::domain::quota::{QuotaAction, UsageRecord};
    use crate::domain::DomainError;
    use crate::infrastructure::quota::InMemoryQuotaStore;

    const USER: &str = "student-1";

    fn analysis_reply() -> MockResumeAssistant {
        let mut assistant = MockResumeAssistant::new();
        assistant
            .expect_analyze_resume()
            .returning(|_| Ok(r#"Sure! {"atsScore": 82, "summary": "Solid"}"#.to_string()));
        assistant
    }

    fn form_body() -> serde_json::Value {
        json!({
            "userId": USER,
            "resumeData": { "personalInfo": { "fullName": "Asha Rao", "email": "asha@campus.edu" } }
        })
    }

    #[tokio::test]
    async fn test_fourth_analysis_in_a_month_is_rejected() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), analysis_reply());

        for expected in 1..=3 {
            let response = app
                .clone()
                .oneshot(json_request("/analyze-resume-form", &form_body()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(usage_count(&store, USER, QuotaAction::Analysis).await, expected);
        }

        let response = app
            .oneshot(json_request("/analyze-resume-form", &form_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = read_json(response).await;
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": "Monthly limit reached",
                "message": "You have reached your monthly limit of 3 resume analyses. Please try again next month."
            })
        );
        assert_eq!(usage_count(&store, USER, QuotaAction::Analysis).await, 3);
    }

    #[tokio::test]
    async fn test_form_analysis_returns_extracted_json() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store, analysis_reply());

        let response = app
            .oneshot(json_request("/analyze-resume-form", &form_body()))
            .await
            .unwrap();

        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["analysis"]["atsScore"], 82);
    }

    #[tokio::test]
    async fn test_unparseable_reply_uses_heuristic_analysis() {
        let mut assistant = MockResumeAssistant::new();
        assistant
            .expect_analyze_resume()
            .returning(|_| Ok("I cannot help with that".to_string()));
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), assistant);

        let response = app
            .oneshot(json_request("/analyze-resume-form", &form_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["analysis"]["atsScore"], 60);
        assert_eq!(usage_count(&store, USER, QuotaAction::Analysis).await, 1);
    }

    #[tokio::test]
    async fn test_missing_user_id_is_rejected_before_the_gate() {
        let mut assistant = MockResumeAssistant::new();
        assistant.expect_analyze_resume().times(0);
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), assistant);

        let response = app
            .oneshot(json_request(
                "/analyze-resume-form",
                &json!({"resumeData": {}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({"success": false, "error": "Missing userId"})
        );
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_resume_data_is_bad_request() {
        let mut assistant = MockResumeAssistant::new();
        assistant.expect_generate_resume().times(0);
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), assistant);

        let response = app
            .oneshot(json_request("/generate-high-ats-resume", &json!({"userId": USER})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_outage_at_gate_fails_closed() {
        let mut assistant = MockResumeAssistant::new();
        assistant.expect_analyze_resume().times(0);
        let store = Arc::new(InMemoryQuotaStore::new());
        store.set_unavailable(true);
        let app = router_with(store, assistant);

        let response = app
            .oneshot(json_request("/analyze-resume-form", &form_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to verify usage");
        assert!(body.get("message").is_none(), "store detail leaked: {body}");
    }

    #[tokio::test]
    async fn test_increment_failure_after_success_still_returns_ok() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let store_for_assistant = store.clone();

        let mut assistant = MockResumeAssistant::new();
        assistant
            .expect_generate_resume()
            .times(1)
            .returning(move |_| {
                // Outage begins after the gate has passed.
                store_for_assistant.set_unavailable(true);
                Ok(r#"{"personalInfo": {"fullName": "Asha Rao"}}"#.to_string())
            });

        let app = router_with(store.clone(), assistant);

        let response = app
            .oneshot(json_request(
                "/generate-high-ats-resume",
                &json!({"userId": USER, "resumeData": {"summary": "Mine"}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["enhancedResumeData"]["summary"], "Mine");

        store.set_unavailable(false);
        assert_eq!(usage_count(&store, USER, QuotaAction::Generation).await, 0);
    }

    #[tokio::test]
    async fn test_assistant_without_key_is_unavailable_and_not_counted() {
        let mut assistant = MockResumeAssistant::new();
        assistant
            .expect_generate_resume()
            .returning(|_| Err(DomainError::configuration("No API key configured for perplexity")));
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), assistant);

        let response = app
            .oneshot(json_request(
                "/generate-high-ats-resume",
                &json!({"userId": USER, "resumeData": {}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(usage_count(&store, USER, QuotaAction::Generation).await, 0);
    }

    #[tokio::test]
    async fn test_generation_limit_is_two() {
        let mut assistant = MockResumeAssistant::new();
        assistant
            .expect_generate_resume()
            .times(2)
            .returning(|_| Ok("no json here".to_string()));
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), assistant);
        let body = json!({"userId": USER, "resumeData": {"skills": {"technical": ["Rust"]}}});

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(json_request("/generate-high-ats-resume", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(json_request("/generate-high-ats-resume", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = read_json(response).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("2 resume generations"));
    }

    #[tokio::test]
    async fn test_ats_text_upload_is_analyzed_and_counted() {
        let mut assistant = MockResumeAssistant::new();
        assistant
            .expect_analyze_resume()
            .withf(|text: &str| text.contains("Rust engineer"))
            .times(1)
            .returning(|_| Ok(r#"{"atsScore": 71}"#.to_string()));
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), assistant);

        let response = app
            .oneshot(multipart_request(
                USER,
                Some(("cv.txt", "Asha Rao - Rust engineer, 3 internships")),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["analysis"]["atsScore"], 71);
        assert_eq!(body["source"], "ai_analysis");
        assert_eq!(usage_count(&store, USER, QuotaAction::Analysis).await, 1);
    }

    #[tokio::test]
    async fn test_ats_upload_without_text_uses_scanned_fallback_and_counts() {
        let mut assistant = MockResumeAssistant::new();
        assistant.expect_analyze_resume().times(0);
        let store = Arc::new(InMemoryQuotaStore::new());
        let app = router_with(store.clone(), assistant);

        let response = app
            .oneshot(multipart_request(USER, Some(("scan.pdf", "   "))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["analysis"]["atsScore"], 75);
        assert_eq!(body["source"], "fallback_scanned_analysis");
        assert_eq!(usage_count(&store, USER, QuotaAction::Analysis).await, 1);
    }

    #[tokio::test]
    async fn test_ats_upload_without_file_is_bad_request() {
        let mut assistant = MockResumeAssistant::new();
        assistant.expect_analyze_resume().times(0);
        let app = router_with(Arc::new(InMemoryQuotaStore::new()), assistant);

        let response = app.oneshot(multipart_request(USER, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_concurrent_requests_at_last_slot_can_both_pass_the_gate() {
        let store = Arc::new(
            InMemoryQuotaStore::new()
                .with_latency(Duration::from_millis(5))
                .with_record(
                    UsageRecord::new(&january_key(USER, QuotaAction::Analysis)).with_count(2),
                ),
        );
        let app = router_with(store.clone(), analysis_reply());

        let (first, second) = tokio::join!(
            app.clone()
                .oneshot(json_request("/analyze-resume-form", &form_body())),
            app.clone()
                .oneshot(json_request("/analyze-resume-form", &form_body())),
        );

        assert_eq!(first.unwrap().status(), StatusCode::OK);
        assert_eq!(second.unwrap().status(), StatusCode::OK);
        // Both observed count 2 before either increment landed.
        assert_eq!(usage_count(&store, USER, QuotaAction::Analysis).await, 4);
    }
}
