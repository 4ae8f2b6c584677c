//! Quota store trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::{UsageKey, UsageRecord};
use crate::domain::DomainError;

/// Durable counter store keyed by identity tuple
///
/// Every call may cross the network. Transport failures are reported as
/// `DomainError::StoreUnavailable`.
#[async_trait]
pub trait QuotaStore: Send + Sync + Debug {
    /// Look up the record for an identity tuple
    async fn find_record(&self, key: &UsageKey) -> Result<Option<UsageRecord>, DomainError>;

    /// Insert a zero-count record.
    ///
    /// Fails with `DomainError::UniqueViolation` when the tuple already exists.
    async fn insert_record(&self, key: &UsageKey) -> Result<UsageRecord, DomainError>;

    /// Overwrite the count of an existing record
    async fn update_count(&self, key: &UsageKey, count: u32) -> Result<UsageRecord, DomainError>;

    /// Create-if-absent and add one, indivisibly.
    ///
    /// Stores without such an operation fail with `DomainError::ProcedureNotFound`.
    async fn atomic_increment(&self, key: &UsageKey) -> Result<UsageRecord, DomainError>;

    /// All records of a user, newest period first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<UsageRecord>, DomainError>;

    /// Connectivity probe
    async fn ping(&self) -> Result<(), DomainError>;
}
