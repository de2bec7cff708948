//! End-to-end tests: a stage started from a real database file.

mod helpers;

use chrono::Utc;
use geoip_filter::geoip::decompressed_sibling;
use geoip_filter::{ConfigurationError, FilterConfig, GeoIpFilter, Record};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use helpers::{write_gzip, write_plain, COVERED_IP, UNCOVERED_IP};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected object, got {}", other),
    }
}

fn start(path: &Path, config: FilterConfig) -> GeoIpFilter {
    GeoIpFilter::start(FilterConfig {
        database_path: Some(path.to_string_lossy().into_owned()),
        ..config
    })
    .expect("Failed to start filter")
}

fn run(filter: &GeoIpFilter, value: Value) -> Value {
    Value::Object(filter.filter("test.access", Utc::now(), record(value)))
}

#[test]
fn test_enriches_nested_record() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let filter = start(&write_plain(temp_dir.path()), FilterConfig::default());

    let enriched = run(&filter, json!({"client_ip": COVERED_IP, "status": 200}));
    assert_eq!(
        enriched,
        json!({
            "client_ip": COVERED_IP,
            "status": 200,
            "geo": {
                "coordinates": {"latitude": 44.9759, "longitude": -93.2166, "accuracy_radius": 20},
                "country": {"code": "US", "name": "United States"},
                "city": {"name": "Minneapolis"},
                "region": {"code": "MN", "name": "Minnesota"},
                "postal": {"code": "55414"},
                "timezone": "America/Chicago"
            }
        })
    );
    filter.shutdown();
}

#[test]
fn test_enriches_flattened_record() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = FilterConfig {
        flatten: true,
        ..Default::default()
    };
    let filter = start(&write_plain(temp_dir.path()), config);

    let enriched = run(&filter, json!({"client_ip": COVERED_IP}));
    let fields = enriched.as_object().unwrap();
    assert_eq!(fields["geo_country_code"], json!("US"));
    assert_eq!(fields["geo_city_name"], json!("Minneapolis"));
    assert_eq!(fields["geo_coordinates_accuracy_radius"], json!(20));
    assert_eq!(fields["geo_region_code"], json!("MN"));
    assert_eq!(fields["geo_timezone"], json!("America/Chicago"));
    assert!(fields.get("geo").is_none());
    assert!(fields.values().all(|v| !v.is_object()));
}

#[test]
fn test_flatten_round_trips_to_nested() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = write_plain(temp_dir.path());
    let nested_filter = start(&path, FilterConfig::default());
    let flat_filter = start(
        &path,
        FilterConfig {
            flatten: true,
            ..Default::default()
        },
    );

    let nested = run(&nested_filter, json!({"client_ip": COVERED_IP}));
    let flat = run(&flat_filter, json!({"client_ip": COVERED_IP}));

    // Every nested leaf appears under its joined key with the same value
    let geo = nested["geo"].as_object().unwrap();
    let mut leaves = 0;
    for (section, value) in geo {
        match value {
            Value::Object(fields) => {
                for (field, leaf) in fields {
                    assert_eq!(flat[format!("geo_{}_{}", section, field)], *leaf);
                    leaves += 1;
                }
            }
            leaf => {
                assert_eq!(flat[format!("geo_{}", section)], *leaf);
                leaves += 1;
            }
        }
    }
    // Plus the untouched client_ip field
    assert_eq!(flat.as_object().unwrap().len(), leaves + 1);
}

#[test]
fn test_uncovered_address_leaves_record_unchanged() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    for flatten in [false, true] {
        let config = FilterConfig {
            flatten,
            ..Default::default()
        };
        let filter = start(&write_plain(temp_dir.path()), config);
        let input = json!({"client_ip": UNCOVERED_IP, "msg": "hi"});
        assert_eq!(run(&filter, input.clone()), input);
    }
}

#[test]
fn test_skipped_addresses() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let filter = start(&write_plain(temp_dir.path()), FilterConfig::default());

    for input in [
        json!({"client_ip": ""}),
        json!({"client_ip": "-"}),
        json!({"client_ip": null}),
        json!({"other": "field"}),
        json!({"client_ip": "10.0.0.5"}),
        json!({"client_ip": "not-an-ip"}),
    ] {
        assert_eq!(run(&filter, input.clone()), input);
    }
    assert_eq!(filter.cached_entries(), 0);
}

#[test]
fn test_memory_mapped_gzip_sibling_removed_on_shutdown() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = write_gzip(temp_dir.path());
    let sibling = decompressed_sibling(&path);

    let config = FilterConfig {
        memory_cache: false,
        ..Default::default()
    };
    let filter = start(&path, config);
    assert!(sibling.exists());
    assert_eq!(
        filter.diagnostics().and_then(|d| d.decompressed_path.clone()),
        Some(sibling.clone())
    );
    assert!(run(&filter, json!({"client_ip": COVERED_IP}))
        .get("geo")
        .is_some());

    filter.shutdown();
    assert!(!sibling.exists());
    assert!(path.exists());
}

#[test]
fn test_in_memory_gzip_leaves_no_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = write_gzip(temp_dir.path());

    let filter = start(&path, FilterConfig::default());
    assert!(!decompressed_sibling(&path).exists());
    assert!(run(&filter, json!({"client_ip": COVERED_IP}))
        .get("geo")
        .is_some());
    filter.shutdown();

    let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn test_start_fails_for_missing_database() {
    let err = GeoIpFilter::start(FilterConfig {
        database_path: Some("/nonexistent/GeoLite2-City.mmdb".to_string()),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::DatabaseUnreadable { .. }));
}

#[test]
fn test_start_fails_for_corrupt_database() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("GeoLite2-City.mmdb");
    std::fs::write(&path, b"definitely not a database").unwrap();

    let err = GeoIpFilter::start(FilterConfig {
        database_path: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::DatabaseInvalid { .. }));
}

#[test]
fn test_start_validates_before_loading() {
    let err = GeoIpFilter::start(FilterConfig {
        database_path: Some("/nonexistent/GeoLite2-City.mmdb".to_string()),
        cache_ttl: 0,
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::InvalidOption {
            option: "cache_ttl",
            ..
        }
    ));
}

#[test]
fn test_shared_across_threads() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let filter = Arc::new(start(&write_plain(temp_dir.path()), FilterConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let filter = Arc::clone(&filter);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let enriched = run(&filter, json!({"client_ip": COVERED_IP}));
                    assert_eq!(enriched["geo"]["country"]["code"], json!("US"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(filter.cached_entries(), 1);
    let cache_stats = filter.cache_stats();
    assert_eq!(cache_stats.misses, 1);
    assert_eq!(cache_stats.hits, 399);
}
