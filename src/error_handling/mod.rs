//! Error handling and processing statistics.
//!
//! This module provides:
//! - `ConfigurationError`, the only error class that is fatal (startup only)
//! - `LookupError`, recovered per record
//! - Processing statistics tracking (errors, warnings, info metrics)
//!
//! Counted outcomes are categorized into:
//! - **Errors**: provider failures and unparsable input
//! - **Warnings**: invalid IP values
//! - **Info**: enrichment outcomes and skipped addresses

mod stats;
mod types;

// Re-export public API
pub use stats::ProcessingStats;
pub use types::{
    ConfigurationError, ErrorType, InfoType, InitializationError, LookupError, WarningType,
};
