//! Record enrichment.
//!
//! Turns raw provider output into the canonical geolocation shape and writes
//! it into log records, nested under `out_key` or flattened to `out_key_*`.

mod accessor;
mod flatten;
mod merge;
mod normalize;

pub use accessor::FieldPath;
pub use flatten::flatten;
pub use merge::merge;
pub use normalize::{
    normalize, CanonicalGeoRecord, City, Coordinates, Country, Postal, Region,
};

/// A structured log record: field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
