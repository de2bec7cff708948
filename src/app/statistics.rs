//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{ErrorType, InfoType, ProcessingStats, WarningType};
use crate::geoip::CacheStats;

/// Prints a one-line summary of the run.
///
/// Works with both plain and JSON log formats (log::info! handles formatting).
pub fn print_simple_summary(total_records: usize, enriched: usize, elapsed_seconds: f64) {
    info!(
        "✅ Processed {} record{} ({} enriched) in {:.1}s",
        total_records,
        if total_records == 1 { "" } else { "s" },
        enriched,
        elapsed_seconds
    );
}

/// Prints enrichment cache effectiveness.
pub fn print_cache_statistics(cache_stats: &CacheStats, cached_entries: usize) {
    let lookups = cache_stats.hits + cache_stats.misses;
    if lookups == 0 {
        return;
    }
    info!(
        "GeoIP cache: {} hits, {} misses ({:.1}% hit rate), {} expired, {} entries cached",
        cache_stats.hits,
        cache_stats.misses,
        cache_stats.hit_rate() * 100.0,
        cache_stats.expired,
        cached_entries
    );
}

/// Prints error, warning, and info statistics to the log.
pub fn print_error_statistics(error_stats: &ProcessingStats) {
    let total_errors = error_stats.total_errors();
    let total_warnings = error_stats.total_warnings();
    let total_info = error_stats.total_info();

    if total_errors > 0 {
        info!("Error Counts ({} total):", total_errors);
        for error_type in ErrorType::iter() {
            let count = error_stats.get_error_count(error_type);
            if count > 0 {
                info!("   {}: {}", error_type.as_str(), count);
            }
        }
    }

    if total_warnings > 0 {
        info!("Warning Counts ({} total):", total_warnings);
        for warning_type in WarningType::iter() {
            let count = error_stats.get_warning_count(warning_type);
            if count > 0 {
                info!("   {}: {}", warning_type.as_str(), count);
            }
        }
    }

    if total_info > 0 {
        info!("Info Counts ({} total):", total_info);
        for info_type in InfoType::iter() {
            let count = error_stats.get_info_count(info_type);
            if count > 0 {
                info!("   {}: {}", info_type.as_str(), count);
            }
        }
    }
}
