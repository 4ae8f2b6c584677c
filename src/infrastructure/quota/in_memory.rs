//! In-memory quota store
//!
//! Behaves like a row store with a unique constraint on the identity tuple.
//! Latency and outages can be injected so that races and failure handling
//! can be exercised without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::quota::{QuotaStore, UsageKey, UsageRecord};
use crate::domain::DomainError;

/// In-memory quota store
#[derive(Debug)]
pub struct InMemoryQuotaStore {
    records: RwLock<HashMap<UsageKey, UsageRecord>>,
    atomic_supported: AtomicBool,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl InMemoryQuotaStore {
    /// Create a store that supports atomic increments
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            atomic_supported: AtomicBool::new(true),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Create a store whose atomic increment reports `ProcedureNotFound`
    pub fn without_atomic_increment() -> Self {
        let store = Self::new();
        store.atomic_supported.store(false, Ordering::SeqCst);
        store
    }

    /// Delay every call by the given duration before touching state
    pub fn with_latency(self, latency: Duration) -> Self {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Seed a record, replacing any existing row for its tuple
    pub fn with_record(self, record: UsageRecord) -> Self {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.key(), record);
        }
        self
    }

    /// Toggle a simulated outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of physical rows
    pub fn row_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    async fn round_trip(&self) -> Result<(), DomainError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);

        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::store_unavailable(
                "In-memory quota store is unavailable",
            ));
        }

        Ok(())
    }
}

impl Default for InMemoryQuotaStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::internal(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn find_record(&self, key: &UsageKey) -> Result<Option<UsageRecord>, DomainError> {
        self.round_trip().await?;

        let records = self.records.read().map_err(lock_error)?;
        Ok(records.get(key).cloned())
    }

    async fn insert_record(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        self.round_trip().await?;

        let mut records = self.records.write().map_err(lock_error)?;

        if records.contains_key(key) {
            return Err(DomainError::unique_violation(format!(
                "Usage record '{}' already exists",
                key
            )));
        }

        let record = UsageRecord::new(key);
        records.insert(key.clone(), record.clone());

        Ok(record)
    }

    async fn update_count(&self, key: &UsageKey, count: u32) -> Result<UsageRecord, DomainError> {
        self.round_trip().await?;

        let mut records = self.records.write().map_err(lock_error)?;

        let record = records
            .get_mut(key)
            .ok_or_else(|| DomainError::not_found(format!("Usage record '{}' not found", key)))?;

        record.count = count;
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn atomic_increment(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        self.round_trip().await?;

        if !self.atomic_supported.load(Ordering::SeqCst) {
            return Err(DomainError::procedure_not_found(
                "increment_resume_usage is not available",
            ));
        }

        let mut records = self.records.write().map_err(lock_error)?;
        let record = records
            .entry(key.clone())
            .or_insert_with(|| UsageRecord::new(key));

        record.count += 1;
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
        self.round_trip().await?;

        let records = self.records.read().map_err(lock_error)?;
        let mut results: Vec<UsageRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();

        results.sort_by(|a, b| {
            b.period()
                .cmp(&a.period())
                .then_with(|| a.action.cmp(&b.action))
        });

        Ok(results)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.round_trip().await
    }
}
