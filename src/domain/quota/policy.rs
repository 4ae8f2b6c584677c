//! Monthly limits per action

use std::collections::BTreeMap;

use serde::Serialize;

use super::QuotaAction;
use crate::domain::DomainError;

/// Monthly ceiling for each action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    limits: BTreeMap<QuotaAction, u32>,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::new()
            .with_limit(QuotaAction::Analysis, 3)
            .with_limit(QuotaAction::Generation, 2)
    }
}

impl QuotaPolicy {
    /// Empty policy; actions without a limit are never allowed
    pub fn new() -> Self {
        Self {
            limits: BTreeMap::new(),
        }
    }

    /// Build from action names as found in configuration. Actions left out
    /// keep their default limit.
    pub fn from_named_limits<'a>(
        limits: impl IntoIterator<Item = (&'a String, &'a u32)>,
    ) -> Result<Self, DomainError> {
        let mut policy = Self::default();

        for (name, limit) in limits {
            let action: QuotaAction = name.parse()?;
            policy = policy.with_limit(action, *limit);
        }

        Ok(policy)
    }

    pub fn with_limit(mut self, action: QuotaAction, limit: u32) -> Self {
        self.limits.insert(action, limit);
        self
    }

    pub fn limit_for(&self, action: QuotaAction) -> u32 {
        self.limits.get(&action).copied().unwrap_or(0)
    }

    /// Text returned with a 429 for this action
    pub fn limit_message(&self, action: QuotaAction) -> String {
        format!(
            "You have reached your monthly limit of {} {}. Please try again next month.",
            self.limit_for(action),
            action.noun()
        )
    }
}

/// Used / limit / remaining for one action in the current month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionUsage {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl ActionUsage {
    pub fn new(used: u32, limit: u32) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }
}
