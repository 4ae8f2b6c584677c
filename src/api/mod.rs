//! API layer - HTTP endpoints and middleware

mod cors;
pub mod health;
pub mod middleware;
pub mod resume;
pub mod router;
pub mod state;
pub mod types;
pub mod usage;

#[cfg(test)]
mod test_support;

pub use router::create_router_with_state;
pub use state::AppState;
