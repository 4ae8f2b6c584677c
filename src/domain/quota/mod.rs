//! Monthly usage quota domain
//!
//! Counts how many times a user ran each paid action in a calendar month
//! and answers whether another run is still allowed.

mod action;
mod period;
mod policy;
mod record;
mod repository;

pub use action::QuotaAction;
pub use period::{Clock, FixedClock, SystemClock, UsagePeriod};
pub use policy::{ActionUsage, QuotaPolicy};
pub use record::{UsageKey, UsageRecord};
pub use repository::QuotaStore;

/// Validate a user ID coming from a request
pub fn validate_user_id(id: &str) -> Result<(), UserIdValidationError> {
    if id.trim().is_empty() {
        return Err(UserIdValidationError::Empty);
    }

    if id.len() > 128 {
        return Err(UserIdValidationError::TooLong(id.len()));
    }

    Ok(())
}

/// User ID validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum UserIdValidationError {
    Empty,
    TooLong(usize),
}

impl std::fmt::Display for UserIdValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Missing userId"),
            Self::TooLong(len) => write!(f, "userId too long: {} chars (max 128)", len),
        }
    }
}

impl std::error::Error for UserIdValidationError {}
