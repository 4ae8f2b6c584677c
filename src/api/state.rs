//! Application state for shared services

use std::sync::Arc;

use crate::domain::assistant::ResumeAssistant;
use crate::domain::quota::QuotaPolicy;
use crate::infrastructure::quota::QuotaServiceTrait;

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub quota_service: Arc<dyn QuotaServiceTrait>,
    pub assistant: Arc<dyn ResumeAssistant>,
    pub policy: Arc<QuotaPolicy>,
}

impl AppState {
    pub fn new(
        quota_service: Arc<dyn QuotaServiceTrait>,
        assistant: Arc<dyn ResumeAssistant>,
        policy: QuotaPolicy,
    ) -> Self {
        Self {
            quota_service,
            assistant,
            policy: Arc::new(policy),
        }
    }
}
