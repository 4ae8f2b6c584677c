//! Bounded-latency wrapper for quota stores

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::quota::{QuotaStore, UsageKey, UsageRecord};
use crate::domain::DomainError;

/// Fails any store call that does not finish within `timeout`
#[derive(Debug, Clone)]
pub struct TimeoutQuotaStore {
    inner: Arc<dyn QuotaStore>,
    timeout: Duration,
}

impl TimeoutQuotaStore {
    pub fn new(inner: Arc<dyn QuotaStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::store_unavailable(format!(
                "Quota store {} timed out after {}ms",
                operation,
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl QuotaStore for TimeoutQuotaStore {
    async fn find_record(&self, key: &UsageKey) -> Result<Option<UsageRecord>, DomainError> {
        self.bounded("find", self.inner.find_record(key)).await
    }

    async fn insert_record(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        self.bounded("insert", self.inner.insert_record(key)).await
    }

    async fn update_count(&self, key: &UsageKey, count: u32) -> Result<UsageRecord, DomainError> {
        self.bounded("update", self.inner.update_count(key, count))
            .await
    }

    async fn atomic_increment(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        self.bounded("increment", self.inner.atomic_increment(key))
            .await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
        self.bounded("list", self.inner.list_for_user(user_id)).await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.bounded("ping", self.inner.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quota::{QuotaAction, UsagePeriod};
    use crate::infrastructure::quota::InMemoryQuotaStore;

    fn key() -> UsageKey {
        UsageKey::new("user-1", QuotaAction::Generation, UsagePeriod::new(2025, 5))
    }

    #[tokio::test]
    async fn test_slow_store_surfaces_store_unavailable() {
        let slow = InMemoryQuotaStore::new().with_latency(Duration::from_millis(200));
        let store = TimeoutQuotaStore::new(Arc::new(slow), Duration::from_millis(20));

        let err = store.find_record(&key()).await.unwrap_err();

        assert!(matches!(err, DomainError::StoreUnavailable { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_fast_store_passes_through() {
        let store = TimeoutQuotaStore::new(
            Arc::new(InMemoryQuotaStore::new()),
            Duration::from_millis(500),
        );

        let record = store.atomic_increment(&key()).await.unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(store.find_record(&key()).await.unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_inner_errors_are_not_rewritten() {
        let store = TimeoutQuotaStore::new(
            Arc::new(InMemoryQuotaStore::without_atomic_increment()),
            Duration::from_millis(500),
        );

        let err = store.atomic_increment(&key()).await.unwrap_err();
        assert!(err.is_procedure_not_found());
    }
}
