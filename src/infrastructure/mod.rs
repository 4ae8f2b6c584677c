//! Infrastructure layer - External service implementations

pub mod assistant;
pub mod logging;
pub mod observability;
pub mod quota;
pub mod storage;
