//! Application initialization.
//!
//! Logger setup for the runner binary. The stage itself is started with
//! [`crate::GeoIpFilter::start`].

mod logger;

// Re-export public API
pub use logger::init_logger_with;
