// Shared test helpers for building GeoIP database fixtures.
//
// The fixture is a minimal but valid MaxMind DB: an IPv4 tree with a single
// node whose right branch (128.0.0.0/1) points at one City record and whose
// left branch (0.0.0.0/1) has no data.

use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";
const NODE_COUNT: u32 = 1;

/// Address covered by the fixture record.
#[allow(dead_code)] // Used by other test files
pub const COVERED_IP: &str = "128.101.101.101";

/// Routable address the fixture holds no data for.
#[allow(dead_code)] // Used by other test files
pub const UNCOVERED_IP: &str = "8.8.8.8";

/// Build timestamp written into the fixture metadata.
#[allow(dead_code)] // Used by other test files
pub const BUILD_EPOCH: u64 = 1_700_000_000;

/// MMDB data section value encoder.
#[derive(Default)]
struct Encoder {
    out: Vec<u8>,
}

impl Encoder {
    fn control(&mut self, type_id: u8, size: usize) {
        assert!(size < 29 + 256, "fixture values must stay small");
        let (size_bits, extra) = if size < 29 {
            (size as u8, None)
        } else {
            (29, Some((size - 29) as u8))
        };
        if type_id <= 7 {
            self.out.push((type_id << 5) | size_bits);
        } else {
            self.out.push(size_bits);
            self.out.push(type_id - 7);
        }
        if let Some(extra) = extra {
            self.out.push(extra);
        }
    }

    fn string(&mut self, value: &str) -> &mut Self {
        self.control(2, value.len());
        self.out.extend_from_slice(value.as_bytes());
        self
    }

    fn double(&mut self, value: f64) -> &mut Self {
        self.control(3, 8);
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn uint16(&mut self, value: u16) -> &mut Self {
        self.control(5, 2);
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn uint32(&mut self, value: u32) -> &mut Self {
        self.control(6, 4);
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn uint64(&mut self, value: u64) -> &mut Self {
        self.control(9, 8);
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn map(&mut self, entries: usize) -> &mut Self {
        self.control(7, entries);
        self
    }

    fn array(&mut self, items: usize) -> &mut Self {
        self.control(11, items);
        self
    }

    fn key(&mut self, key: &str) -> &mut Self {
        self.string(key)
    }

    fn names(&mut self, en: &str) -> &mut Self {
        self.key("names").map(1).key("en").string(en)
    }
}

fn city_record() -> Vec<u8> {
    let mut e = Encoder::default();
    e.map(5);
    e.key("city").map(2).key("geoname_id").uint32(5037649).names("Minneapolis");
    e.key("country")
        .map(2)
        .key("iso_code")
        .string("US")
        .names("United States");
    e.key("location")
        .map(4)
        .key("accuracy_radius")
        .uint16(20)
        .key("latitude")
        .double(44.9759)
        .key("longitude")
        .double(-93.2166)
        .key("time_zone")
        .string("America/Chicago");
    e.key("postal").map(1).key("code").string("55414");
    e.key("subdivisions")
        .array(1)
        .map(2)
        .key("iso_code")
        .string("MN")
        .names("Minnesota");
    e.out
}

fn metadata() -> Vec<u8> {
    let mut e = Encoder::default();
    e.map(9);
    e.key("binary_format_major_version").uint16(2);
    e.key("binary_format_minor_version").uint16(0);
    e.key("build_epoch").uint64(BUILD_EPOCH);
    e.key("database_type").string("GeoLite2-City");
    e.key("description")
        .map(1)
        .key("en")
        .string("geoip_filter test fixture");
    e.key("ip_version").uint16(4);
    e.key("languages").array(1).string("en");
    e.key("node_count").uint32(NODE_COUNT);
    e.key("record_size").uint16(24);
    e.out
}

fn record24(value: u32) -> [u8; 3] {
    let bytes = value.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}

/// Raw bytes of the fixture database.
pub fn city_database() -> Vec<u8> {
    let mut db = Vec::new();
    // Left: no data. Right: data section offset 0.
    db.extend_from_slice(&record24(NODE_COUNT));
    db.extend_from_slice(&record24(NODE_COUNT + 16));
    db.extend_from_slice(&[0u8; 16]);
    db.extend_from_slice(&city_record());
    db.extend_from_slice(METADATA_MARKER);
    db.extend_from_slice(&metadata());
    db
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).expect("Failed to gzip fixture");
    encoder.finish().expect("Failed to gzip fixture")
}

/// Writes the fixture as a plain `.mmdb` into `dir`.
#[allow(dead_code)] // Used by other test files
pub fn write_plain(dir: &Path) -> PathBuf {
    let path = dir.join("GeoLite2-City.mmdb");
    std::fs::write(&path, city_database()).expect("Failed to write fixture");
    path
}

/// Writes the fixture as a gzip-compressed `.mmdb.gz` into `dir`.
#[allow(dead_code)] // Used by other test files
pub fn write_gzip(dir: &Path) -> PathBuf {
    let path = dir.join("GeoLite2-City.mmdb.gz");
    std::fs::write(&path, gzip(&city_database())).expect("Failed to write fixture");
    path
}

/// Writes the fixture the way MaxMind ships it: a `.tar.gz` with the
/// database under a dated directory next to license files.
#[allow(dead_code)] // Used by other test files
pub fn write_tar_gz(dir: &Path) -> PathBuf {
    let db = city_database();
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in [
        ("GeoLite2-City_20250101/COPYRIGHT.txt", b"copyright".as_slice()),
        ("GeoLite2-City_20250101/GeoLite2-City.mmdb", db.as_slice()),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).expect("Failed to set tar path");
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append(&header, content)
            .expect("Failed to append tar entry");
    }
    let tar = builder.into_inner().expect("Failed to finish tar");

    let path = dir.join("GeoLite2-City_20250101.tar.gz");
    std::fs::write(&path, gzip(&tar)).expect("Failed to write fixture");
    path
}
