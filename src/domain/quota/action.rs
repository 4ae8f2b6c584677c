//! Quota-gated action kinds

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// An expensive operation whose monthly use is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaAction {
    /// Resume analysis (form or uploaded document)
    Analysis,
    /// High-ATS resume generation
    Generation,
}

impl QuotaAction {
    /// All known actions, in summary order
    pub const ALL: [QuotaAction; 2] = [QuotaAction::Generation, QuotaAction::Analysis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Generation => "generation",
        }
    }

    /// Plural noun used in user-facing limit messages
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Analysis => "resume analyses",
            Self::Generation => "resume generations",
        }
    }
}

impl std::fmt::Display for QuotaAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QuotaAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analysis" => Ok(Self::Analysis),
            "generation" => Ok(Self::Generation),
            other => Err(DomainError::validation(format!(
                "Unknown quota action '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_str() {
        for action in QuotaAction::ALL {
            assert_eq!(action.as_str().parse::<QuotaAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = "payment".parse::<QuotaAction>().unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&QuotaAction::Generation).unwrap(),
            "\"generation\""
        );
    }
}
