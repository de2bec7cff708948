//! Configuration types and CLI options.
//!
//! `FilterConfig` is the immutable option set a stage is started with. It can
//! be built programmatically, deserialized from a JSON document supplied by
//! the host, or assembled from the runner's command-line flags via `Opt`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::config::constants::{
    DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL_SECS, DEFAULT_KEY_NAME, DEFAULT_OUT_KEY, DEFAULT_TAG,
    DEFAULT_WORKERS,
};
use crate::enrich::FieldPath;
use crate::error_handling::ConfigurationError;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Recognized options of the GeoIP enrichment stage.
///
/// Missing keys take their defaults when deserialized; unknown keys are
/// rejected so that typos surface at startup.
///
/// # Examples
///
/// ```
/// use geoip_filter::FilterConfig;
///
/// let config = FilterConfig {
///     key_name: "remote_addr".to_string(),
///     flatten: true,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Database path. When absent, well-known locations are searched.
    pub database_path: Option<String>,

    /// Record field (or `$.a.b` accessor path) holding the IP address
    pub key_name: String,

    /// Field receiving the nested enrichment, or prefix of flattened keys
    pub out_key: String,

    /// Emit `out_key_*` scalar fields instead of one nested object
    pub flatten: bool,

    /// Maximum number of cached lookups
    pub cache_size: usize,

    /// Cache entry lifetime in seconds
    pub cache_ttl: u64,

    /// Skip private, loopback and otherwise reserved addresses
    pub skip_private_ip: bool,

    /// Load the whole database into memory instead of memory-mapping it
    pub memory_cache: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            key_name: DEFAULT_KEY_NAME.to_string(),
            out_key: DEFAULT_OUT_KEY.to_string(),
            flatten: false,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL_SECS,
            skip_private_ip: true,
            memory_cache: true,
        }
    }
}

impl FilterConfig {
    /// Reads a configuration document (JSON object) from disk.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigurationError::ConfigFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        serde_json::from_str(&content).map_err(|e| ConfigurationError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Checks every option, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.cache_size == 0 {
            return Err(ConfigurationError::invalid(
                "cache_size",
                "must be greater than zero",
            ));
        }
        if self.cache_ttl == 0 {
            return Err(ConfigurationError::invalid(
                "cache_ttl",
                "must be greater than zero",
            ));
        }
        if self.out_key.is_empty() {
            return Err(ConfigurationError::invalid("out_key", "must not be empty"));
        }
        FieldPath::parse(&self.key_name)?;
        Ok(())
    }

    /// Cache entry lifetime as a `Duration`.
    pub fn cache_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

/// Command-line options of the `geoip_filter` runner.
///
/// Stage options given here override those read from `--config`.
#[derive(Debug, Parser)]
#[command(
    name = "geoip_filter",
    version,
    about = "Enrich newline-delimited JSON log records with GeoLite2 geolocation data"
)]
pub struct Opt {
    /// Newline-delimited JSON input file (stdin when omitted)
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// JSON file with stage options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// GeoLite2 City database (.mmdb, .mmdb.gz or .tar.gz)
    #[arg(long)]
    pub database_path: Option<String>,

    /// Field holding the IP address
    #[arg(long)]
    pub key_name: Option<String>,

    /// Field receiving the enrichment
    #[arg(long)]
    pub out_key: Option<String>,

    /// Flatten enrichment into `<out_key>_*` fields
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub flatten: Option<bool>,

    /// Maximum number of cached lookups
    #[arg(long)]
    pub cache_size: Option<usize>,

    /// Cache entry lifetime in seconds
    #[arg(long)]
    pub cache_ttl: Option<u64>,

    /// Skip private and reserved addresses (true/false)
    #[arg(long)]
    pub skip_private_ip: Option<bool>,

    /// Load the database into memory (true) or memory-map it (false)
    #[arg(long)]
    pub memory_cache: Option<bool>,

    /// Tag reported alongside per-record warnings
    #[arg(long, default_value = DEFAULT_TAG)]
    pub tag: String,

    /// Number of records enriched concurrently
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}

impl Opt {
    /// Builds the stage configuration: config file first, flags on top.
    pub fn filter_config(&self) -> Result<FilterConfig, ConfigurationError> {
        let mut config = match &self.config {
            Some(path) => FilterConfig::from_json_file(path)?,
            None => FilterConfig::default(),
        };

        if let Some(path) = &self.database_path {
            config.database_path = Some(path.clone());
        }
        if let Some(key_name) = &self.key_name {
            config.key_name = key_name.clone();
        }
        if let Some(out_key) = &self.out_key {
            config.out_key = out_key.clone();
        }
        if let Some(flatten) = self.flatten {
            config.flatten = flatten;
        }
        if let Some(cache_size) = self.cache_size {
            config.cache_size = cache_size;
        }
        if let Some(cache_ttl) = self.cache_ttl {
            config.cache_ttl = cache_ttl;
        }
        if let Some(skip) = self.skip_private_ip {
            config.skip_private_ip = skip;
        }
        if let Some(memory_cache) = self.memory_cache {
            config.memory_cache = memory_cache;
        }

        config.validate()?;
        Ok(config)
    }
}
