//! Runner support modules.
//!
//! This module provides the statistics printing used at the end of a run and
//! the wait for outstanding workers before the stage is shut down.

pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use shutdown::reclaim_filter;
pub use statistics::{print_cache_statistics, print_error_statistics, print_simple_summary};
