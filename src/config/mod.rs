//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AssistantConfig, CorsConfig, LogFormat, LoggingConfig, ProviderConfig,
    QuotaConfig, ServerConfig, StorageBackend, StorageConfig,
};
