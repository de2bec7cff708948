//! GeoIP database access using MaxMind GeoLite2 City databases.
//!
//! This module finds the database resource, loads it (unpacking `.gz` and
//! `.tar.gz` artifacts when needed), and answers lookups through the
//! `LookupProvider` trait. Results are memoized in a TTL + LRU cache, and
//! record IP fields are classified before any lookup happens.

mod artifact;
mod cache;
mod classify;
mod extract;
mod loader;
mod provider;
mod resolve;
mod types;

// Re-export public API
pub use artifact::TempArtifact;
pub use cache::{CacheStats, GeoCache};
pub use classify::{classify, is_private_ip, IpClass};
pub use extract::{decompressed_sibling, detect_compression, Compression};
pub use loader::{load_database, LoadedDatabase};
pub use provider::{LookupProvider, MaxMindProvider};
pub use resolve::{resolve_database, resolve_with, Anchor, Candidate, SearchRoots, CANDIDATES};
pub use types::{
    DatabaseMetadata, LoadDiagnostics, LoadMode, Names, RawCity, RawCountry, RawGeoRecord,
    RawLocation, RawPostal, RawSubdivision,
};

#[cfg(test)]
pub(crate) use provider::fake;
