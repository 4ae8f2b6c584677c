//! OpenAI-compatible chat completion assistant

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::http_client::HttpClientTrait;
use crate::domain::assistant::ResumeAssistant;
use crate::domain::DomainError;

const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are an expert ATS resume analyzer. Always respond with valid JSON only.";

/// One chat-completion endpoint and the model used on it
#[derive(Debug, Clone)]
pub struct ChatCompletionProvider {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    json_mode: bool,
}

impl ChatCompletionProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            temperature: None,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask the provider for a JSON object response
    pub fn with_json_mode(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, messages: &[ChatMessage]) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(temperature) = self.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if self.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Resume assistant backed by two chat-completion providers: one for
/// analysis, one for generation
#[derive(Debug)]
pub struct ChatCompletionAssistant {
    client: Arc<dyn HttpClientTrait>,
    analysis: ChatCompletionProvider,
    generation: ChatCompletionProvider,
}

impl ChatCompletionAssistant {
    pub fn new(
        client: Arc<dyn HttpClientTrait>,
        analysis: ChatCompletionProvider,
        generation: ChatCompletionProvider,
    ) -> Self {
        Self {
            client,
            analysis,
            generation,
        }
    }

    async fn complete(
        &self,
        provider: &ChatCompletionProvider,
        messages: Vec<ChatMessage>,
    ) -> Result<String, DomainError> {
        let api_key = provider.api_key.as_deref().ok_or_else(|| {
            DomainError::configuration(format!("No API key configured for {}", provider.name))
        })?;

        let auth_header = format!("Bearer {}", api_key);
        let headers = vec![
            ("Authorization", auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        debug!(provider = %provider.name, model = %provider.model, "Sending chat completion");

        let json = self
            .client
            .post_json(
                &provider.chat_completions_url(),
                headers,
                &provider.build_request(&messages),
            )
            .await?;

        let response: ChatCompletionResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(&provider.name, format!("Failed to parse response: {}", e))
        })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DomainError::provider(&provider.name, "No choices in response"))?;

        info!(
            provider = %provider.name,
            response_len = content.len(),
            "Chat completion received"
        );

        Ok(content)
    }
}

#[async_trait]
impl ResumeAssistant for ChatCompletionAssistant {
    async fn analyze_resume(&self, resume_text: &str) -> Result<String, DomainError> {
        let messages = vec![
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(analysis_prompt(resume_text)),
        ];

        self.complete(&self.analysis, messages).await
    }

    async fn generate_resume(&self, resume_data: &Value) -> Result<String, DomainError> {
        let messages = vec![ChatMessage::user(generation_prompt(resume_data))];

        self.complete(&self.generation, messages).await
    }
}

fn analysis_prompt(resume_text: &str) -> String {
    format!(
        r#"Analyze the following resume for ATS (Applicant Tracking System) compatibility.

RESUME:
{resume_text}

Respond with a JSON object of this shape:
{{
  "atsScore": number (0-100),
  "overallGrade": "A/B/C/D/F",
  "summary": "two sentence assessment",
  "strengths": ["specific strengths"],
  "weaknesses": ["specific weaknesses"],
  "keywordAnalysis": {{
    "found": ["keywords found"],
    "missing": ["important keywords missing"],
    "suggestions": ["keyword suggestions"]
  }},
  "formatAnalysis": {{
    "score": number (0-100),
    "issues": ["formatting issues that hurt ATS parsing"],
    "suggestions": ["formatting improvements"]
  }},
  "careerLevel": "entry/mid/senior",
  "recommendedImprovements": [
    {{
      "priority": "high/medium/low",
      "category": "content/format/keywords",
      "issue": "issue description",
      "solution": "specific solution"
    }}
  ],
  "nextSteps": ["prioritized next steps"]
}}

Focus on quantified achievements, action verbs, industry keywords and ATS-friendly formatting."#
    )
}

fn generation_prompt(resume_data: &Value) -> String {
    let data = serde_json::to_string_pretty(resume_data).unwrap_or_else(|_| resume_data.to_string());

    format!(
        r#"Rewrite the following resume data into a high-scoring ATS resume.

ORIGINAL DATA:
{data}

Rules:
- Keep names, contact details, institutions and dates exactly as given.
- Rewrite experience and project bullets to start with action verbs and include metrics.
- Group skills into "languages", "frameworks" and "cloudDatabasesTech".

Respond with a single JSON object with the keys "personalInfo", "professionalTitle",
"summary", "experience", "education", "projects", "skills" and "achievements"."#
    )
}
