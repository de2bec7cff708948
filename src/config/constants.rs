//! Configuration constants.
//!
//! Defaults for every recognized stage option, plus the fixed file names and
//! search locations used when no database path is configured.

/// Default record field holding the client IP address.
pub const DEFAULT_KEY_NAME: &str = "client_ip";

/// Default record field (or flattened key prefix) receiving the enrichment.
pub const DEFAULT_OUT_KEY: &str = "geo";

/// Default maximum number of cached IP lookups.
pub const DEFAULT_CACHE_SIZE: usize = 8192;

/// Default cache entry lifetime in seconds (1 hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Placeholder some web servers write instead of an address.
pub const EMPTY_IP_PLACEHOLDER: &str = "-";

/// File name of the bundled GeoLite2 City database.
pub const GEOIP_DB_FILE_NAME: &str = "GeoLite2-City.mmdb";

/// Directory (relative to the working or install directory) holding bundled data.
pub const VENDOR_DATA_DIR: &str = "vendor/data";

/// System-wide locations probed after the vendor paths, in order.
pub const SYSTEM_GEOIP_DIRS: [&str; 2] = ["/usr/share/GeoIP", "/usr/local/share/GeoIP"];

/// Suffix of the sibling file a compressed database is unpacked into when
/// the database is memory-mapped instead of held in memory.
pub const DECOMPRESSED_SUFFIX: &str = ".decompressed.mmdb";

/// Default number of records enriched concurrently by the CLI runner.
pub const DEFAULT_WORKERS: usize = 4;

/// Default tag attached to records read by the CLI runner.
pub const DEFAULT_TAG: &str = "geoip";

/// How long the CLI runner waits for in-flight workers before shutdown.
pub const SHUTDOWN_GRACE_SECS: u64 = 5;
