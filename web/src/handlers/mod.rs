//! HTTP request handlers.

pub mod health;
pub mod metrics;
pub mod orders;

// Re-export common handler utilities
pub use health::health_check;
