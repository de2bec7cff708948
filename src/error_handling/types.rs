//! Error type definitions.
//!
//! This module defines the fatal startup errors, the recoverable per-record
//! lookup error, and the counter categories tracked while filtering.

use log::SetLoggerError;
use std::path::PathBuf;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Fatal configuration problems. Any of these prevents the stage from starting.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// No database path was configured and none of the well-known locations exist.
    #[error("GeoIP database not found. Searched in:\n  {}", format_searched(.searched))]
    DatabaseNotFound {
        /// Every candidate that was probed, in probe order
        searched: Vec<PathBuf>,
    },

    /// The database resource exists (or was configured) but could not be read.
    #[error("Failed to read GeoIP database {path:?}: {source}")]
    DatabaseUnreadable {
        /// Resource path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The resource was read but is not a usable MaxMind database.
    #[error("Failed to parse GeoIP database {path:?}: {message}")]
    DatabaseInvalid {
        /// Resource path
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    /// An option has a value the stage cannot run with.
    #[error("Invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// Option name as spelled in the configuration surface
        option: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A configuration document could not be read or parsed.
    #[error("Failed to load configuration from {path:?}: {message}")]
    ConfigFile {
        /// Document path
        path: PathBuf,
        /// Read or parse error
        message: String,
    },
}

impl ConfigurationError {
    pub(crate) fn invalid(option: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidOption {
            option,
            reason: reason.into(),
        }
    }
}

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n  ")
}

/// A lookup provider failed for one address.
///
/// Recovered per record: the record passes through unchanged.
#[derive(Error, Debug)]
#[error("GeoIP lookup failed for {ip}: {message}")]
pub struct LookupError {
    /// Address that was being looked up
    pub ip: String,
    /// Provider error message
    pub message: String,
}

/// Failures counted while filtering records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    /// The lookup provider raised an error
    LookupFailure,
    /// An input line was not a JSON object (runner only)
    MalformedInput,
}

/// Recoverable oddities in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum WarningType {
    /// The IP field held something that is not an IPv4/IPv6 address
    InvalidIp,
}

/// Informational outcomes of a filter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    /// Record enriched with geolocation fields
    Enriched,
    /// IP field missing, empty or `-`
    MissingIp,
    /// Private or reserved address skipped
    PrivateIp,
    /// Address looked up but the database holds no data for it
    NoGeoData,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    /// Human-readable label used in statistics output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::LookupFailure => "GeoIP lookup failure",
            ErrorType::MalformedInput => "Malformed input record",
        }
    }
}

impl std::fmt::Display for WarningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WarningType {
    /// Human-readable label used in statistics output.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningType::InvalidIp => "Invalid IP address",
        }
    }
}

impl std::fmt::Display for InfoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InfoType {
    /// Human-readable label used in statistics output.
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::Enriched => "Records enriched",
            InfoType::MissingIp => "Missing IP address",
            InfoType::PrivateIp => "Private IP address skipped",
            InfoType::NoGeoData => "No geolocation data",
        }
    }
}
