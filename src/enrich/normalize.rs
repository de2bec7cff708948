//! Canonical enrichment shape.
//!
//! `CanonicalGeoRecord` is what ends up in the log record. Every sub-record
//! is present only if it carries at least one leaf, so serializing never
//! produces `{}` or empty strings.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::geoip::{RawGeoRecord, RawLocation};

/// Location of the address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Coordinates {
    /// Degrees north
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Degrees east
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Radius in kilometers around the coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<u16>,
}

/// Country the address is registered in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// English name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// City of the address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct City {
    /// English name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Confidence from 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

/// First-level subdivision (state, province).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Region {
    /// ISO 3166-2 subdivision code without the country prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// English name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Confidence from 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

/// Postal code of the address.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Postal {
    /// Postal code as published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Confidence from 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

/// Normalized geolocation for one address.
///
/// An empty record (`is_empty()`) means the address was looked up and
/// nothing usable was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalGeoRecord {
    /// Latitude, longitude and accuracy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    /// City
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
    /// First subdivision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    /// Postal code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal: Option<Postal>,
    /// IANA time zone name, e.g. `America/Chicago`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl CanonicalGeoRecord {
    /// Whether no sub-record is present.
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_none()
            && self.country.is_none()
            && self.city.is_none()
            && self.region.is_none()
            && self.postal.is_none()
            && self.timezone.is_none()
    }

    /// The record as a JSON object, absent keys omitted.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                log::warn!("Failed to serialize geolocation record: {}", e);
                Map::new()
            }
        }
    }
}

/// Empty strings count as absent.
fn text(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

fn coordinates(location: &RawLocation) -> Option<Coordinates> {
    let coordinates = Coordinates {
        latitude: location.latitude,
        longitude: location.longitude,
        accuracy_radius: location.accuracy_radius,
    };
    (coordinates != Coordinates::default()).then_some(coordinates)
}

/// Maps a raw provider record to the canonical shape.
///
/// `None` yields an empty record. Only the first subdivision contributes to
/// `region`; the time zone is promoted out of `location`.
pub fn normalize(raw: Option<&RawGeoRecord>) -> CanonicalGeoRecord {
    let Some(raw) = raw else {
        return CanonicalGeoRecord::default();
    };

    let country = raw
        .country
        .as_ref()
        .map(|c| Country {
            code: text(&c.iso_code),
            name: text(&c.names.en),
        })
        .filter(|c| *c != Country::default());

    let city = raw
        .city
        .as_ref()
        .map(|c| City {
            name: text(&c.names.en),
            confidence: c.confidence,
        })
        .filter(|c| *c != City::default());

    let region = raw
        .subdivisions
        .first()
        .map(|s| Region {
            code: text(&s.iso_code),
            name: text(&s.names.en),
            confidence: s.confidence,
        })
        .filter(|r| *r != Region::default());

    let postal = raw
        .postal
        .as_ref()
        .map(|p| Postal {
            code: text(&p.code),
            confidence: p.confidence,
        })
        .filter(|p| *p != Postal::default());

    CanonicalGeoRecord {
        coordinates: raw.location.as_ref().and_then(coordinates),
        country,
        city,
        region,
        postal,
        timezone: raw.location.as_ref().and_then(|l| text(&l.time_zone)),
    }
}
