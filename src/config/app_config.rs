use std::collections::BTreeMap;

use serde::Deserialize;

use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

/// Quota row store settings
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Falls back to `DATABASE_URL` when unset
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// `upsert`, `procedure` or `none`
    #[serde(default = "default_atomic_increment")]
    pub atomic_increment: String,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl StorageConfig {
    pub fn resolved_database_url(&self) -> Option<String> {
        self.database_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.is_empty())
    }
}

/// Monthly limits and fallback increment protection
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Limit per action name, e.g. `analysis = 3`
    #[serde(default = "default_limits")]
    pub limits: BTreeMap<String, u32>,
    /// `keyed_lock` or `none`
    #[serde(default = "default_fallback_guard")]
    pub fallback_guard: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origin_suffixes")]
    pub allowed_origin_suffixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_analysis_provider")]
    pub analysis: ProviderConfig,
    #[serde(default = "default_generation_provider")]
    pub generation: ProviderConfig,
}

/// An OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub json_mode: bool,
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_operation_timeout_ms() -> u64 {
    5000
}

fn default_atomic_increment() -> String {
    "upsert".to_string()
}

fn default_limits() -> BTreeMap<String, u32> {
    BTreeMap::from([("analysis".to_string(), 3), ("generation".to_string(), 2)])
}

fn default_fallback_guard() -> String {
    "keyed_lock".to_string()
}

fn default_allowed_origin_suffixes() -> Vec<String> {
    vec![".vercel.app".to_string(), ".onrender.com".to_string()]
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_analysis_provider() -> ProviderConfig {
    ProviderConfig {
        name: "groq".to_string(),
        base_url: "https://api.groq.com/openai/v1".to_string(),
        model: "llama-3.3-70b-versatile".to_string(),
        api_key_env: "GROQ_API_KEY".to_string(),
        timeout_secs: default_provider_timeout_secs(),
        temperature: Some(0.3),
        max_tokens: Some(4000),
        json_mode: true,
    }
}

fn default_generation_provider() -> ProviderConfig {
    ProviderConfig {
        name: "perplexity".to_string(),
        base_url: "https://api.perplexity.ai".to_string(),
        model: "sonar".to_string(),
        api_key_env: "PERPLEXITY_API_KEY".to_string(),
        timeout_secs: default_provider_timeout_secs(),
        temperature: None,
        max_tokens: None,
        json_mode: false,
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            operation_timeout_ms: default_operation_timeout_ms(),
            atomic_increment: default_atomic_increment(),
            run_migrations: true,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limits: default_limits(),
            fallback_guard: default_fallback_guard(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin_suffixes: default_allowed_origin_suffixes(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            analysis: default_analysis_provider(),
            generation: default_generation_provider(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
