//! geoip_filter library: GeoIP enrichment stage for structured log records
//!
//! This library provides a log-pipeline stage that looks up the IP address
//! held in a record field in a MaxMind GeoLite2 City database and merges the
//! resulting geolocation (coordinates, country, city, region, postal code,
//! time zone) back into the record, nested or flattened.
//!
//! # Example
//!
//! ```no_run
//! use geoip_filter::{FilterConfig, GeoIpFilter};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let filter = GeoIpFilter::start(FilterConfig {
//!     database_path: Some("/usr/share/GeoIP/GeoLite2-City.mmdb".to_string()),
//!     flatten: true,
//!     ..Default::default()
//! })?;
//!
//! let record = match json!({"client_ip": "128.101.101.101"}) {
//!     serde_json::Value::Object(map) => map,
//!     _ => unreachable!(),
//! };
//! let enriched = filter.filter("access.log", chrono::Utc::now(), record);
//! println!("{}", serde_json::Value::Object(enriched));
//! filter.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! The stage itself is synchronous. The NDJSON runner (`run_filter`,
//! `run_stream`) requires a Tokio runtime.

#![warn(missing_docs)]

mod app;
pub mod config;
pub mod enrich;
pub mod error_handling;
mod filter;
pub mod geoip;
pub mod initialization;

// Re-export public API
pub use app::reclaim_filter;
pub use config::{FilterConfig, LogFormat, LogLevel, Opt};
pub use enrich::{CanonicalGeoRecord, Record};
pub use error_handling::{ConfigurationError, LookupError, ProcessingStats};
pub use filter::GeoIpFilter;
pub use geoip::{LookupProvider, RawGeoRecord};
pub use run::{run_filter, run_stream, RunReport};

// NDJSON runner used by the binary
mod run {
    use anyhow::{Context, Result};
    use chrono::Utc;
    use std::path::Path;
    use std::sync::Arc;

    use futures::StreamExt;
    use log::{info, warn};
    use serde_json::Value;
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

    use crate::app::{print_cache_statistics, print_error_statistics, print_simple_summary};
    use crate::error_handling::{ErrorType, InfoType};
    use crate::filter::GeoIpFilter;

    /// Results of running a record stream through the stage.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RunReport {
        /// Number of non-blank input lines
        pub total_records: usize,
        /// Records that received geolocation fields
        pub enriched: usize,
        /// Lines that were not JSON objects and were passed through verbatim
        pub malformed: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Output of one input line.
    struct LineOutcome {
        text: String,
        malformed: bool,
    }

    fn process_line(
        filter: &GeoIpFilter,
        tag: &str,
        line_number: usize,
        line: String,
    ) -> LineOutcome {
        let record = match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(record)) => record,
            Ok(other) => {
                warn!(
                    "[{}] line {}: expected a JSON object, got {}; passing through",
                    tag,
                    line_number,
                    json_kind(&other)
                );
                return LineOutcome {
                    text: line,
                    malformed: true,
                };
            }
            Err(e) => {
                warn!(
                    "[{}] line {}: invalid JSON ({}); passing through",
                    tag, line_number, e
                );
                return LineOutcome {
                    text: line,
                    malformed: true,
                };
            }
        };

        let enriched = filter.filter(tag, Utc::now(), record);
        match serde_json::to_string(&enriched) {
            Ok(text) => LineOutcome {
                text,
                malformed: false,
            },
            Err(e) => {
                warn!(
                    "[{}] line {}: failed to serialize enriched record ({}); passing through",
                    tag, line_number, e
                );
                LineOutcome {
                    text: line,
                    malformed: false,
                }
            }
        }
    }

    fn json_kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        }
    }

    /// Runs newline-delimited JSON records from `input` through `filter`.
    ///
    /// Up to `workers` records are enriched concurrently on Tokio's blocking
    /// pool; output lines are written to `output` in input order. Blank lines
    /// are dropped. Lines that are not JSON objects are counted, logged and
    /// written unchanged.
    ///
    /// # Errors
    ///
    /// Reading `input` or writing `output` fails, or a worker panics.
    pub async fn run_stream<R, W>(
        filter: Arc<GeoIpFilter>,
        tag: &str,
        workers: usize,
        input: R,
        mut output: W,
    ) -> Result<RunReport>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let start_time = std::time::Instant::now();
        let enriched_before = filter.stats().get_info_count(InfoType::Enriched);
        let tag: Arc<str> = Arc::from(tag);

        // A read error ends the stream after being reported
        let lines = futures::stream::unfold(Some(input.lines()), |state| async move {
            let mut lines = state?;
            match lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(lines))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });

        let mut outcomes = Box::pin(
            lines
                .enumerate()
                .filter(|(_, line)| {
                    let blank = matches!(line, Ok(text) if text.trim().is_empty());
                    futures::future::ready(!blank)
                })
                .map(|(index, line)| {
                    let filter = Arc::clone(&filter);
                    let tag = Arc::clone(&tag);
                    async move {
                        let line = line.context("Failed to read line from input")?;
                        tokio::task::spawn_blocking(move || {
                            process_line(&filter, &tag, index + 1, line)
                        })
                        .await
                        .context("Record worker panicked")
                    }
                })
                .buffered(workers.max(1)),
        );

        let mut total_records = 0usize;
        let mut malformed = 0usize;
        while let Some(outcome) = outcomes.next().await {
            let outcome = outcome?;
            total_records += 1;
            if outcome.malformed {
                malformed += 1;
                filter.stats().increment_error(ErrorType::MalformedInput);
            }
            output
                .write_all(outcome.text.as_bytes())
                .await
                .context("Failed to write output")?;
            output
                .write_all(b"\n")
                .await
                .context("Failed to write output")?;
        }
        output.flush().await.context("Failed to flush output")?;

        Ok(RunReport {
            total_records,
            enriched: filter.stats().get_info_count(InfoType::Enriched) - enriched_before,
            malformed,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Runs records from `input` (stdin when `None`) through `filter`, writing
    /// to stdout, then prints run statistics.
    ///
    /// # Errors
    ///
    /// The input file cannot be opened, or `run_stream` fails.
    pub async fn run_filter(
        filter: Arc<GeoIpFilter>,
        input: Option<&Path>,
        tag: &str,
        workers: usize,
    ) -> Result<RunReport> {
        let stdout = tokio::io::stdout();
        let report = match input {
            Some(path) => {
                info!("Reading records from {}", path.display());
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open input file {}", path.display()))?;
                let input = BufReader::new(file);
                run_stream(Arc::clone(&filter), tag, workers, input, stdout).await?
            }
            None => {
                info!("Reading records from stdin");
                let stdin = BufReader::new(tokio::io::stdin());
                run_stream(Arc::clone(&filter), tag, workers, stdin, stdout).await?
            }
        };

        print_error_statistics(&filter.stats());
        print_cache_statistics(&filter.cache_stats(), filter.cached_entries());
        print_simple_summary(
            report.total_records,
            report.enriched,
            report.elapsed_seconds,
        );
        Ok(report)
    }
}
