//! Compressed artifact handling.
//!
//! GeoLite2 databases ship either as a gzip-compressed `.mmdb` or as a
//! `.tar.gz` archive with the `.mmdb` inside. Both are unpacked here, either
//! into memory or into a file on disk.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tar::Archive;

use crate::config::DECOMPRESSED_SUFFIX;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_BLOCK_SIZE: usize = 512;

/// Compression layout of a database resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Plain `.mmdb`
    None,
    /// A single gzip-compressed `.mmdb`
    Gzip,
    /// A gzip-compressed tar archive containing an `.mmdb`
    TarGzip,
}

impl Compression {
    /// Whether anything has to be unpacked.
    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }
}

/// Detects compression from the file name, falling back to the gzip magic bytes.
pub fn detect_compression(path: &Path, head: &[u8]) -> Compression {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Compression::TarGzip
    } else if name.ends_with(".gz") || head.starts_with(&GZIP_MAGIC) {
        Compression::Gzip
    } else {
        Compression::None
    }
}

/// Sibling file a compressed resource is unpacked into for memory-mapping.
///
/// `GeoLite2-City.mmdb.gz` becomes `GeoLite2-City.decompressed.mmdb`.
pub fn decompressed_sibling(path: &Path) -> std::path::PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("geoip");
    let stem = [".tar.gz", ".tgz", ".mmdb.gz", ".gz"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    path.with_file_name(format!("{}{}", stem, DECOMPRESSED_SUFFIX))
}

/// Unpacks compressed database bytes into memory.
///
/// A gzip payload that turns out to be a tar archive is unpacked further,
/// whatever the declared compression.
pub fn decompress_to_vec(compressed: &[u8], compression: Compression) -> Result<Vec<u8>> {
    log::debug!("Decompressing {} bytes of GeoIP data", compressed.len());

    let mut payload = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut payload)
        .context("Failed to decompress gzip stream")?;

    if compression == Compression::TarGzip || looks_like_tar(&payload) {
        return extract_mmdb_from_tar(payload.as_slice());
    }
    Ok(payload)
}

/// Unpacks a compressed database file into `dest`, returning the bytes written.
///
/// As with `decompress_to_vec`, a gzip payload that turns out to be a tar
/// archive is unpacked further. The payload is written to a partial file
/// first and renamed into place, so an interrupted run never leaves a
/// truncated `dest` behind for reuse.
pub fn decompress_to_file(src: &Path, dest: &Path, compression: Compression) -> Result<u64> {
    let file = File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;
    let mut decoder = GzDecoder::new(BufReader::new(file));

    // Peek at the first tar header block; the payload is re-assembled below
    let mut head = Vec::with_capacity(TAR_BLOCK_SIZE);
    (&mut decoder)
        .take(TAR_BLOCK_SIZE as u64)
        .read_to_end(&mut head)
        .context("Failed to decompress gzip stream")?;
    let is_tar = compression == Compression::TarGzip || looks_like_tar(&head);
    let payload = Cursor::new(head).chain(decoder);

    let partial = dest.with_extension("partial");
    let mut out = File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let written = if is_tar {
        copy_mmdb_from_tar(payload, &mut out)
    } else {
        std::io::copy(&mut BufReader::new(payload), &mut out)
            .context("Failed to decompress gzip stream")
    };

    let written = match written {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            return Err(e);
        }
    };
    drop(out);

    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move unpacked database to {}", dest.display()))?;
    log::info!(
        "Decompressed {} into {} ({} bytes)",
        src.display(),
        dest.display(),
        written
    );
    Ok(written)
}

fn looks_like_tar(payload: &[u8]) -> bool {
    payload
        .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
        .is_some_and(|magic| magic == TAR_MAGIC)
}

fn is_mmdb_entry(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("mmdb")
}

/// Extracts the first `.mmdb` entry of a tar archive.
fn extract_mmdb_from_tar<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .context("Failed to read tar archive entries")?;

    for entry_result in entries {
        let mut entry = entry_result.context("Failed to read tar entry")?;
        let path = entry.path().context("Failed to get entry path")?.into_owned();
        if is_mmdb_entry(&path) {
            let mut mmdb_bytes = Vec::new();
            entry
                .read_to_end(&mut mmdb_bytes)
                .with_context(|| format!("Failed to read {} from archive", path.display()))?;
            log::info!(
                "Extracted {} from tar.gz ({} bytes)",
                path.display(),
                mmdb_bytes.len()
            );
            return Ok(mmdb_bytes);
        }
    }

    Err(anyhow::anyhow!("No .mmdb file found in tar.gz archive"))
}

fn copy_mmdb_from_tar<R: Read>(reader: R, out: &mut File) -> Result<u64> {
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .context("Failed to read tar archive entries")?;

    for entry_result in entries {
        let mut entry = entry_result.context("Failed to read tar entry")?;
        let path = entry.path().context("Failed to get entry path")?.into_owned();
        if is_mmdb_entry(&path) {
            return std::io::copy(&mut entry, out)
                .with_context(|| format!("Failed to read {} from archive", path.display()));
        }
    }

    Err(anyhow::anyhow!("No .mmdb file found in tar.gz archive"))
}
