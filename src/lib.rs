//! Campus Quota Gateway
//!
//! HTTP service that puts monthly per-user quotas in front of LLM-backed
//! resume analysis and generation:
//! - Per-user, per-action, per-calendar-month usage counters
//! - Atomic increments with a guarded read-modify-write fallback
//! - In-memory or PostgreSQL quota storage

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tracing::{info, warn};

use api::state::AppState;
use crate::config::{ProviderConfig, StorageBackend, StorageConfig};
use domain::assistant::ResumeAssistant;
use domain::quota::{QuotaPolicy, QuotaStore};
use infrastructure::assistant::{ChatCompletionAssistant, ChatCompletionProvider, HttpClient};
use infrastructure::quota::{
    AtomicIncrementStrategy, FallbackGuard, InMemoryQuotaStore, PostgresQuotaStore, QuotaService,
    TimeoutQuotaStore,
};
use infrastructure::storage::{run_quota_migrations, PostgresConfig};

/// Create the application state with default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Create the application state with custom configuration
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let store = create_quota_store(&config.storage).await?;

    let fallback_guard = FallbackGuard::from_str(&config.quota.fallback_guard).ok_or_else(|| {
        anyhow!(
            "Unknown quota.fallback_guard '{}' (expected keyed_lock or none)",
            config.quota.fallback_guard
        )
    })?;

    if fallback_guard == FallbackGuard::None {
        warn!("Fallback increments are unguarded; concurrent requests can lose updates");
    }

    let quota_service = QuotaService::new(store).with_fallback_guard(fallback_guard);

    let policy = QuotaPolicy::from_named_limits(&config.quota.limits)
        .context("Invalid quota.limits")?;

    let assistant = create_assistant(config)?;

    info!(
        backend = ?config.storage.backend,
        fallback_guard = ?fallback_guard,
        "Application state initialized"
    );

    Ok(AppState::new(Arc::new(quota_service), assistant, policy))
}

async fn create_quota_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn QuotaStore>> {
    let inner: Arc<dyn QuotaStore> = match storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory quota store");
            Arc::new(InMemoryQuotaStore::new())
        }
        StorageBackend::Postgres => {
            let url = storage
                .resolved_database_url()
                .context("storage.database_url or DATABASE_URL must be set for postgres")?;

            let strategy = AtomicIncrementStrategy::from_str(&storage.atomic_increment)
                .ok_or_else(|| {
                    anyhow!(
                        "Unknown storage.atomic_increment '{}' (expected upsert, procedure or none)",
                        storage.atomic_increment
                    )
                })?;

            let pool = PostgresConfig::new(url)
                .with_max_connections(storage.max_connections)
                .with_min_connections(storage.min_connections)
                .connect()
                .await?;

            if storage.run_migrations {
                run_quota_migrations(&pool).await?;
            }

            info!(strategy = ?strategy, "Using PostgreSQL quota store");
            Arc::new(PostgresQuotaStore::new(pool, strategy))
        }
    };

    Ok(Arc::new(TimeoutQuotaStore::new(
        inner,
        Duration::from_millis(storage.operation_timeout_ms),
    )))
}

fn create_assistant(config: &AppConfig) -> anyhow::Result<Arc<dyn ResumeAssistant>> {
    let analysis = &config.assistant.analysis;
    let generation = &config.assistant.generation;

    let timeout = Duration::from_secs(analysis.timeout_secs.max(generation.timeout_secs));
    let client = HttpClient::with_timeout("assistant", timeout)?;

    Ok(Arc::new(ChatCompletionAssistant::new(
        Arc::new(client),
        build_provider(analysis),
        build_provider(generation),
    )))
}

fn build_provider(config: &ProviderConfig) -> ChatCompletionProvider {
    let mut provider = ChatCompletionProvider::new(
        &config.name,
        &config.base_url,
        &config.model,
        config.api_key(),
    );

    if let Some(temperature) = config.temperature {
        provider = provider.with_temperature(temperature);
    }

    if let Some(max_tokens) = config.max_tokens {
        provider = provider.with_max_tokens(max_tokens);
    }

    if config.json_mode {
        provider = provider.with_json_mode();
    }

    if !provider.is_configured() {
        warn!(
            provider = %config.name,
            env = %config.api_key_env,
            "No API key configured; requests using this provider will be refused"
        );
    }

    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quota::QuotaAction;

    #[tokio::test]
    async fn test_default_state_uses_memory_store() {
        let state = create_app_state().await.unwrap();

        assert!(state.quota_service.ping().await.is_ok());
        assert_eq!(state.policy.limit_for(QuotaAction::Analysis), 3);
        assert_eq!(state.policy.limit_for(QuotaAction::Generation), 2);
    }

    #[tokio::test]
    async fn test_invalid_fallback_guard_is_rejected() {
        let mut config = AppConfig::default();
        config.quota.fallback_guard = "sometimes".to_string();

        let err = create_app_state_with_config(&config).await.err().unwrap();
        assert!(err.to_string().contains("fallback_guard"));
    }

    #[tokio::test]
    async fn test_configured_limits_apply() {
        let mut config = AppConfig::default();
        config.quota.limits.insert("generation".to_string(), 5);

        let state = create_app_state_with_config(&config).await.unwrap();
        assert_eq!(state.policy.limit_for(QuotaAction::Generation), 5);
    }
}
