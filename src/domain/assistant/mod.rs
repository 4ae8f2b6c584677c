//! Resume assistant domain
//!
//! The assistant is the expensive collaborator behind the quota gate. It
//! returns raw model text; callers shape it with the helpers in `content`.

mod content;

pub use content::{
    enhance_resume_fallback, extract_json_object, fallback_form_analysis, fallback_text_analysis,
    format_resume_for_analysis, merge_generated_resume, scanned_document_analysis,
    MIN_EXTRACTED_TEXT_LEN,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// LLM-backed resume analysis and generation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResumeAssistant: Send + Sync {
    /// Analyze resume text, returning the model's raw reply
    async fn analyze_resume(&self, resume_text: &str) -> Result<String, DomainError>;

    /// Produce an ATS-optimized rewrite of structured resume data
    async fn generate_resume(&self, resume_data: &Value) -> Result<String, DomainError>;
}
