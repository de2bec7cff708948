//! GeoIP database loading.
//!
//! Turns a resolved resource into a `MaxMindProvider`, either by reading the
//! whole database into memory or by memory-mapping it. Compressed resources
//! are unpacked into memory, or into a sibling file the stage owns.

use maxminddb::Reader;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::artifact::TempArtifact;
use super::extract::{
    decompress_to_file, decompress_to_vec, decompressed_sibling, detect_compression, Compression,
};
use super::provider::MaxMindProvider;
use super::types::{LoadDiagnostics, LoadMode};
use crate::error_handling::ConfigurationError;

/// A ready provider plus the temporary file backing it, if any.
#[derive(Debug)]
pub struct LoadedDatabase {
    /// Reader over the loaded database
    pub provider: MaxMindProvider,
    /// Present only for memory-mapped compressed resources
    pub artifact: Option<TempArtifact>,
}

fn unreadable(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigurationError + '_ {
    move |source| ConfigurationError::DatabaseUnreadable {
        path: path.to_path_buf(),
        source,
    }
}

fn invalid(path: &Path, message: impl std::fmt::Display) -> ConfigurationError {
    ConfigurationError::DatabaseInvalid {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn read_head(path: &Path) -> Result<Vec<u8>, ConfigurationError> {
    let mut head = Vec::with_capacity(2);
    File::open(path)
        .and_then(|f| f.take(2).read_to_end(&mut head))
        .map_err(unreadable(path))?;
    Ok(head)
}

fn open_mapped(path: &Path) -> Result<Reader<maxminddb::Mmap>, ConfigurationError> {
    // SAFETY: the mapped file is either owned by this stage (the decompressed
    // sibling) or an operator-managed database that is replaced atomically,
    // never truncated in place, while the stage runs.
    let reader = unsafe { Reader::open_mmap(path) };
    reader.map_err(|e| invalid(path, e))
}

/// Loads the database at `path`.
///
/// With `in_memory` the whole (decompressed) database is read into a buffer.
/// Otherwise the file is memory-mapped; a compressed resource is first
/// unpacked once into a sibling file, which is reused if it already exists
/// and deleted when the returned artifact is released.
///
/// # Errors
///
/// `DatabaseUnreadable` when the resource cannot be read, `DatabaseInvalid`
/// when it cannot be unpacked or is not a MaxMind database.
pub fn load_database(
    path: &Path,
    in_memory: bool,
) -> Result<(LoadedDatabase, LoadDiagnostics), ConfigurationError> {
    log::info!("Loading GeoIP database from: {}", path.display());
    let start = Instant::now();

    let raw_size = std::fs::metadata(path).map_err(unreadable(path))?.len();
    let compression = detect_compression(path, &read_head(path)?);

    let mut artifact = None;
    let mut decompressed_path: Option<PathBuf> = None;

    let (provider, decompressed_size, mode) = if in_memory {
        let bytes = std::fs::read(path).map_err(unreadable(path))?;
        let payload = if compression.is_compressed() {
            decompress_to_vec(&bytes, compression).map_err(|e| invalid(path, format!("{:#}", e)))?
        } else {
            bytes
        };
        let size = payload.len() as u64;
        let reader = Reader::from_source(payload).map_err(|e| invalid(path, e))?;
        (MaxMindProvider::InMemory(reader), size, LoadMode::InMemory)
    } else if compression.is_compressed() {
        let sibling = decompressed_sibling(path);
        if sibling.is_file() {
            log::info!(
                "Reusing decompressed GeoIP database {}",
                sibling.display()
            );
        } else {
            decompress_to_file(path, &sibling, compression)
                .map_err(|e| invalid(path, format!("{:#}", e)))?;
        }
        // Owned from here on: a failed open below removes it again
        let guard = TempArtifact::new(sibling.clone());
        let size = std::fs::metadata(&sibling)
            .map_err(unreadable(&sibling))?
            .len();
        let reader = open_mapped(&sibling)?;
        artifact = Some(guard);
        decompressed_path = Some(sibling);
        (MaxMindProvider::Mapped(reader), size, LoadMode::Mapped)
    } else {
        let reader = open_mapped(path)?;
        (MaxMindProvider::Mapped(reader), raw_size, LoadMode::Mapped)
    };

    let diagnostics = LoadDiagnostics {
        source: path.to_path_buf(),
        decompressed_path,
        compressed: compression != Compression::None,
        raw_size,
        decompressed_size,
        load_duration: start.elapsed(),
        mode,
        metadata: provider.metadata(),
    };

    Ok((LoadedDatabase { provider, artifact }, diagnostics))
}
