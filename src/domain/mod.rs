//! Domain layer - Core business logic and entities

pub mod assistant;
pub mod error;
pub mod quota;

pub use assistant::ResumeAssistant;
pub use error::DomainError;
pub use quota::{
    validate_user_id, ActionUsage, Clock, QuotaAction, QuotaPolicy, QuotaStore, UsageKey,
    UsagePeriod, UsageRecord, UserIdValidationError,
};
