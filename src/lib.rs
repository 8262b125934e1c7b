//! Synthetic transaction flow generator
//!
//! Exercises a payment gateway's transaction lifecycle (authorize, capture,
//! cancel, refund, increase) across many merchant configurations, pacing
//! each merchant with its own cooldown.

pub mod catalog;
pub mod checkout;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod runner;
pub mod scheduler;
pub mod stats;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::Config;
pub use error::{Error, Result};
pub use runner::Runner;
pub use stats::ExecutionStatistics;
