//! Lookup providers.
//!
//! The stage only needs `lookup(ip) -> record?`. `MaxMindProvider` answers it
//! from a GeoLite2 database held in memory or memory-mapped; tests and
//! embedders can supply any other implementation.

use maxminddb::{Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use super::types::{DatabaseMetadata, RawGeoRecord};
use crate::error_handling::LookupError;

/// Resolves an address to raw geolocation data.
///
/// `Ok(None)` means the database holds nothing for the address; an address
/// that is simply not covered must never surface as an error.
pub trait LookupProvider: Send + Sync {
    /// Looks up one address.
    fn lookup(&self, ip: IpAddr) -> Result<Option<RawGeoRecord>, LookupError>;
}

impl<P: LookupProvider + ?Sized> LookupProvider for Arc<P> {
    fn lookup(&self, ip: IpAddr) -> Result<Option<RawGeoRecord>, LookupError> {
        (**self).lookup(ip)
    }
}

/// A MaxMind database reader over either backing store.
pub enum MaxMindProvider {
    /// Database bytes owned on the heap
    InMemory(Reader<Vec<u8>>),
    /// Database paged in from a mapped file
    Mapped(Reader<Mmap>),
}

impl std::fmt::Debug for MaxMindProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            MaxMindProvider::InMemory(_) => "InMemory",
            MaxMindProvider::Mapped(_) => "Mapped",
        };
        f.debug_tuple("MaxMindProvider").field(&variant).finish()
    }
}

impl MaxMindProvider {
    /// Metadata embedded in the database.
    pub fn metadata(&self) -> DatabaseMetadata {
        let metadata = match self {
            MaxMindProvider::InMemory(reader) => &reader.metadata,
            MaxMindProvider::Mapped(reader) => &reader.metadata,
        };
        DatabaseMetadata {
            database_type: metadata.database_type.clone(),
            build_epoch: metadata.build_epoch,
            version: format!("build_{}", metadata.build_epoch),
        }
    }
}

fn lookup_in<S: AsRef<[u8]>>(
    reader: &Reader<S>,
    ip: IpAddr,
) -> Result<Option<RawGeoRecord>, LookupError> {
    let to_error = |e: maxminddb::MaxMindDbError| LookupError {
        ip: ip.to_string(),
        message: e.to_string(),
    };

    // maxminddb 0.27: lookup() yields a LookupResult; has_data() is false for
    // addresses outside every network in the tree
    let result = reader.lookup(ip).map_err(to_error)?;
    if !result.has_data() {
        return Ok(None);
    }
    result.decode::<RawGeoRecord>().map_err(to_error)
}

impl LookupProvider for MaxMindProvider {
    fn lookup(&self, ip: IpAddr) -> Result<Option<RawGeoRecord>, LookupError> {
        match self {
            MaxMindProvider::InMemory(reader) => lookup_in(reader, ip),
            MaxMindProvider::Mapped(reader) => lookup_in(reader, ip),
        }
    }
}
