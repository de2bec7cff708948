//! GeoIP data structures.
//!
//! `RawGeoRecord` mirrors the subset of the GeoLite2 City record layout the
//! stage reads. It is decoded straight out of the database with serde, so
//! every level is optional and unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Localized names keyed by locale. Only English is read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Names {
    /// English name
    pub en: Option<String>,
}

/// `location` block of a City record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawLocation {
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
    /// Radius in kilometers the coordinates are accurate to
    pub accuracy_radius: Option<u16>,
    /// IANA time zone name
    pub time_zone: Option<String>,
}

/// `country` block of a City record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCountry {
    /// ISO 3166-1 alpha-2 code
    pub iso_code: Option<String>,
    /// Localized country names
    #[serde(default)]
    pub names: Names,
}

/// `city` block of a City record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCity {
    /// Localized city names
    #[serde(default)]
    pub names: Names,
    /// Confidence (0-100) that the city is correct; Enterprise databases only
    pub confidence: Option<u8>,
}

/// One entry of the `subdivisions` list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSubdivision {
    /// ISO 3166-2 code without the country prefix
    pub iso_code: Option<String>,
    /// Localized subdivision names
    #[serde(default)]
    pub names: Names,
    /// Confidence (0-100); Enterprise databases only
    pub confidence: Option<u8>,
}

/// `postal` block of a City record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPostal {
    /// Postal code
    pub code: Option<String>,
    /// Confidence (0-100); Enterprise databases only
    pub confidence: Option<u8>,
}

/// Raw record returned by a lookup provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawGeoRecord {
    /// Coordinates and time zone
    pub location: Option<RawLocation>,
    /// Country the address is registered in
    pub country: Option<RawCountry>,
    /// City
    pub city: Option<RawCity>,
    /// Ordered most to least specific; only the first entry is used
    #[serde(default)]
    pub subdivisions: Vec<RawSubdivision>,
    /// Postal code
    pub postal: Option<RawPostal>,
}

/// How the database is held once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Whole database read into a heap buffer
    InMemory,
    /// Database memory-mapped and paged in on demand
    Mapped,
}

impl std::fmt::Display for LoadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadMode::InMemory => f.write_str("in-memory"),
            LoadMode::Mapped => f.write_str("memory-mapped"),
        }
    }
}

/// Metadata stored inside the MaxMind database itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseMetadata {
    /// e.g. `GeoLite2-City`
    pub database_type: String,
    /// Build timestamp, seconds since the Unix epoch
    pub build_epoch: u64,
    /// `build_<epoch>`, the version label used in log lines
    pub version: String,
}

/// What the loader did, reported once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct LoadDiagnostics {
    /// Resource the database was loaded from
    pub source: PathBuf,
    /// File actually handed to the reader when a sibling file was unpacked
    pub decompressed_path: Option<PathBuf>,
    /// Whether the resource was `.gz` or `.tar.gz`
    pub compressed: bool,
    /// Size of the resource on disk in bytes
    pub raw_size: u64,
    /// Size of the MMDB payload in bytes (equals `raw_size` when uncompressed)
    pub decompressed_size: u64,
    /// Time spent reading, unpacking and opening the database
    pub load_duration: Duration,
    /// How the database is held
    pub mode: LoadMode,
    /// Metadata embedded in the database
    pub metadata: DatabaseMetadata,
}

impl LoadDiagnostics {
    /// Emits the startup summary at info level.
    pub fn log(&self) {
        log::info!("GeoIP database resolved: {}", self.source.display());
        if let Some(unpacked) = &self.decompressed_path {
            log::info!("GeoIP database unpacked to: {}", unpacked.display());
        }
        log::info!(
            "GeoIP database {} ({}) loaded {}: raw {} bytes, decompressed {} bytes in {:.1}ms",
            self.metadata.database_type,
            self.metadata.version,
            self.mode,
            self.raw_size,
            self.decompressed_size,
            self.load_duration.as_secs_f64() * 1000.0
        );
    }
}
