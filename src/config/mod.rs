//! Stage configuration and constants.
//!
//! This module provides:
//! - Option defaults and fixed database search locations
//! - The validated `FilterConfig` consumed by the stage
//! - CLI option types for the bundled runner

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{FilterConfig, LogFormat, LogLevel, Opt};
