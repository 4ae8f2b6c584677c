//! Monthly usage record entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{QuotaAction, UsagePeriod};

/// Identity tuple of a usage record: (user, action, year, month)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsageKey {
    pub user_id: String,
    pub action: QuotaAction,
    pub period: UsagePeriod,
}

impl UsageKey {
    pub fn new(user_id: impl Into<String>, action: QuotaAction, period: UsagePeriod) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            period,
        }
    }
}

impl std::fmt::Display for UsageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.user_id, self.action, self.period)
    }
}

/// Persisted counter row for one identity tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub action: QuotaAction,
    pub year: i32,
    pub month: u32,
    pub count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Fresh record with a zero count
    pub fn new(key: &UsageKey) -> Self {
        let now = Utc::now();

        Self {
            user_id: key.user_id.clone(),
            action: key.action,
            year: key.period.year,
            month: key.period.month,
            count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn period(&self) -> UsagePeriod {
        UsagePeriod::new(self.year, self.month)
    }

    pub fn key(&self) -> UsageKey {
        UsageKey::new(self.user_id.clone(), self.action, self.period())
    }
}
