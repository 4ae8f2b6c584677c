//! Monthly usage quota service

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::domain::quota::{
    ActionUsage, Clock, QuotaAction, QuotaPolicy, QuotaStore, SystemClock, UsageKey, UsageRecord,
};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_quota_increment;

/// How the read-modify-write fallback is protected when the store has no
/// atomic increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackGuard {
    /// Serialize fallback increments per identity tuple inside this process
    #[default]
    KeyedLock,
    /// No protection; concurrent increments can be lost
    None,
}

impl FallbackGuard {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keyed_lock" | "keyed-lock" | "lock" => Some(Self::KeyedLock),
            "none" | "unguarded" => Some(Self::None),
            _ => None,
        }
    }
}

/// Trait for the quota service
#[async_trait]
pub trait QuotaServiceTrait: Send + Sync + Debug {
    /// Return this month's record, creating it with a zero count if absent
    async fn get_or_init_record(
        &self,
        user_id: &str,
        action: QuotaAction,
    ) -> Result<UsageRecord, DomainError>;

    /// Add one use for this month
    async fn increment_usage(
        &self,
        user_id: &str,
        action: QuotaAction,
    ) -> Result<UsageRecord, DomainError>;

    /// Whether this month's count is still below `limit`.
    ///
    /// Advisory only: nothing is reserved between this check and the
    /// following increment.
    async fn check_limit(
        &self,
        user_id: &str,
        action: QuotaAction,
        limit: u32,
    ) -> Result<bool, DomainError>;

    /// Used / limit / remaining for every action in the policy, without
    /// creating rows
    async fn usage_summary(
        &self,
        user_id: &str,
        policy: &QuotaPolicy,
    ) -> Result<BTreeMap<QuotaAction, ActionUsage>, DomainError>;

    /// All stored records of a user, newest period first
    async fn list_records(&self, user_id: &str) -> Result<Vec<UsageRecord>, DomainError>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<(), DomainError>;
}

/// Per-identity-tuple async locks, dropped once no caller holds or awaits them
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<UsageKey, KeyedLockEntry>>,
}

#[derive(Debug, Default)]
struct KeyedLockEntry {
    lock: Arc<AsyncMutex<()>>,
    /// Callers holding or waiting on `lock`
    holders: usize,
}

impl KeyedLocks {
    async fn lock(&self, key: &UsageKey) -> KeyedLockGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = locks.entry(key.clone()).or_default();
            entry.holders += 1;
            entry.lock.clone()
        };

        // Registered before awaiting so a cancelled waiter still releases its slot.
        let mut guard = KeyedLockGuard {
            locks: self,
            key: key.clone(),
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    fn release(&self, key: &UsageKey) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = locks.get_mut(key) {
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders == 0 {
                locks.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held per-tuple lock. Dropping it, including when the owning future is
/// cancelled, unlocks and releases the map entry.
struct KeyedLockGuard<'a> {
    locks: &'a KeyedLocks,
    key: UsageKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.key);
    }
}

/// Quota service implementation
#[derive(Debug)]
pub struct QuotaService {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    fallback_guard: FallbackGuard,
    locks: KeyedLocks,
}

impl QuotaService {
    /// Create a service using the wall clock and a keyed-lock fallback
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            fallback_guard: FallbackGuard::default(),
            locks: KeyedLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fallback_guard(mut self, guard: FallbackGuard) -> Self {
        self.fallback_guard = guard;
        self
    }

    fn current_key(&self, user_id: &str, action: QuotaAction) -> UsageKey {
        UsageKey::new(user_id, action, self.clock.current_period())
    }

    async fn get_or_init(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        if let Some(record) = self.store.find_record(key).await? {
            return Ok(record);
        }

        match self.store.insert_record(key).await {
            Ok(record) => {
                debug!(key = %key, "Initialized usage record");
                Ok(record)
            }
            Err(e) if e.is_unique_violation() => {
                debug!(key = %key, "Concurrent init won the race, re-reading usage record");
                self.store.find_record(key).await?.ok_or_else(|| {
                    DomainError::internal(format!(
                        "Usage record '{}' vanished after unique violation",
                        key
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Read-modify-write increment. Lossy under concurrency unless guarded.
    async fn read_modify_write(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        let current = self.get_or_init(key).await?;
        let next = current.count + 1;

        debug!(key = %key, from = current.count, to = next, "Incrementing usage");

        self.store.update_count(key, next).await
    }

    async fn fallback_increment(&self, key: &UsageKey) -> Result<UsageRecord, DomainError> {
        match self.fallback_guard {
            FallbackGuard::None => self.read_modify_write(key).await,
            FallbackGuard::KeyedLock => {
                let _guard = self.locks.lock(key).await;
                self.read_modify_write(key).await
            }
        }
    }
}

#[async_trait]
impl QuotaServiceTrait for QuotaService {
    async fn get_or_init_record(
        &self,
        user_id: &str,
        action: QuotaAction,
    ) -> Result<UsageRecord, DomainError> {
        let key = self.current_key(user_id, action);
        self.get_or_init(&key).await
    }

    async fn increment_usage(
        &self,
        user_id: &str,
        action: QuotaAction,
    ) -> Result<UsageRecord, DomainError> {
        let key = self.current_key(user_id, action);

        match self.store.atomic_increment(&key).await {
            Ok(record) => {
                info!(key = %key, count = record.count, "Usage incremented atomically");
                record_quota_increment(action, "atomic");
                Ok(record)
            }
            Err(e) if e.is_procedure_not_found() => {
                warn!(
                    key = %key,
                    guard = ?self.fallback_guard,
                    error = %e,
                    "Atomic increment unavailable, using read-modify-write fallback"
                );

                let record = self.fallback_increment(&key).await?;
                info!(key = %key, count = record.count, "Usage incremented via fallback");
                record_quota_increment(action, "fallback");
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    async fn check_limit(
        &self,
        user_id: &str,
        action: QuotaAction,
        limit: u32,
    ) -> Result<bool, DomainError> {
        let record = self.get_or_init_record(user_id, action).await?;
        Ok(record.count < limit)
    }

    async fn usage_summary(
        &self,
        user_id: &str,
        policy: &QuotaPolicy,
    ) -> Result<BTreeMap<QuotaAction, ActionUsage>, DomainError> {
        let mut summary = BTreeMap::new();

        for action in QuotaAction::ALL {
            let key = self.current_key(user_id, action);
            let used = self
                .store
                .find_record(&key)
                .await?
                .map(|r| r.count)
                .unwrap_or(0);

            summary.insert(action, ActionUsage::new(used, policy.limit_for(action)));
        }

        Ok(summary)
    }

    async fn list_records(&self, user_id: &str) -> Result<Vec<UsageRecord>, DomainError> {
        self.store.list_for_user(user_id).await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.store.ping().await
    }
}
