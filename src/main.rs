//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `geoip_filter` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Stage startup and shutdown
//! - User-facing error reporting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use geoip_filter::config::SHUTDOWN_GRACE_SECS;
use geoip_filter::initialization::init_logger_with;
use geoip_filter::{reclaim_filter, run_filter, GeoIpFilter, Opt};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    let log_level = opt.log_level.clone();
    let log_format = opt.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    // Startup problems are fatal: nothing is read before the database is ready
    let filter = match opt
        .filter_config()
        .and_then(GeoIpFilter::start)
        .context("Failed to start GeoIP filter")
    {
        Ok(filter) => Arc::new(filter),
        Err(e) => {
            eprintln!("geoip_filter error: {:#}", e);
            process::exit(1);
        }
    };

    let result = run_filter(
        Arc::clone(&filter),
        opt.input.as_deref(),
        &opt.tag,
        opt.workers,
    )
    .await;

    // Workers abandoned by a failed run may still hold the stage briefly
    match reclaim_filter(filter, Duration::from_secs(SHUTDOWN_GRACE_SECS)).await {
        Ok(filter) => filter.shutdown(),
        Err(_) => log::warn!(
            "GeoIP filter still in use after {}s; skipping shutdown",
            SHUTDOWN_GRACE_SECS
        ),
    }

    if let Err(e) = result {
        eprintln!("geoip_filter error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}
