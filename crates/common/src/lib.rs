//! Storyreel Common Utilities
//!
//! Shared infrastructure for all Storyreel crates:
//! - Error types and result aliases
//! - Frame pacing and wall-clock helpers (injectable for tests)
//! - Tracing/logging initialization
//! - Configuration loading (provider credentials are passed explicitly)

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
