//! Quota infrastructure - stores and the usage quota service

mod in_memory;
mod postgres;
mod service;
mod timeout;

pub use in_memory::InMemoryQuotaStore;
pub use postgres::{AtomicIncrementStrategy, PostgresQuotaStore};
pub use service::{FallbackGuard, QuotaService, QuotaServiceTrait};
pub use timeout::TimeoutQuotaStore;
