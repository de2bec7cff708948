//! The GeoIP enrichment stage.
//!
//! `GeoIpFilter` owns everything a running stage needs: the validated
//! configuration, the lookup provider, the enrichment cache and, for
//! memory-mapped compressed databases, the unpacked file it must delete on
//! shutdown. It is `Send + Sync`; share it as `Arc<GeoIpFilter>`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::FilterConfig;
use crate::enrich::{merge, normalize, FieldPath, Record};
use crate::error_handling::{ConfigurationError, ErrorType, InfoType, ProcessingStats, WarningType};
use crate::geoip::{
    classify, load_database, resolve_database, CacheStats, GeoCache, IpClass, LoadDiagnostics,
    LookupProvider, TempArtifact,
};

/// A started enrichment stage.
pub struct GeoIpFilter {
    config: FilterConfig,
    key_path: FieldPath,
    provider: Box<dyn LookupProvider>,
    // Declared after `provider` so the mapping is gone before the file is removed
    artifact: Option<TempArtifact>,
    cache: GeoCache,
    stats: Arc<ProcessingStats>,
    diagnostics: Option<LoadDiagnostics>,
}

impl std::fmt::Debug for GeoIpFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoIpFilter")
            .field("config", &self.config)
            .field("key_path", &self.key_path)
            .field("artifact", &self.artifact)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl GeoIpFilter {
    /// Starts the stage: validates `config`, resolves and loads the database.
    ///
    /// Blocks until the database is ready.
    ///
    /// # Errors
    ///
    /// Any `ConfigurationError`; the stage must not process records then.
    pub fn start(config: FilterConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let path = resolve_database(config.database_path.as_deref())?;
        let (loaded, diagnostics) = load_database(&path, config.memory_cache)?;
        diagnostics.log();

        let mut filter = Self::with_provider(config, loaded.provider)?;
        filter.artifact = loaded.artifact;
        filter.diagnostics = Some(diagnostics);
        Ok(filter)
    }

    /// Builds a stage around an arbitrary provider, skipping database loading.
    pub fn with_provider<P>(config: FilterConfig, provider: P) -> Result<Self, ConfigurationError>
    where
        P: LookupProvider + 'static,
    {
        config.validate()?;
        let key_path = FieldPath::parse(&config.key_name)?;
        let capacity = NonZeroUsize::new(config.cache_size).ok_or_else(|| {
            ConfigurationError::invalid("cache_size", "must be greater than zero")
        })?;
        let cache = GeoCache::new(capacity, config.cache_ttl_duration());

        log::info!(
            "GeoIP filter ready: key_name={} out_key={} flatten={} cache_size={} cache_ttl={}s skip_private_ip={}",
            key_path,
            config.out_key,
            config.flatten,
            config.cache_size,
            config.cache_ttl,
            config.skip_private_ip
        );

        Ok(Self {
            config,
            key_path,
            provider: Box::new(provider),
            artifact: None,
            cache,
            stats: Arc::new(ProcessingStats::new()),
            diagnostics: None,
        })
    }

    /// Enriches one record.
    ///
    /// Never fails: records whose IP field is absent, invalid or private, or
    /// whose lookup fails or finds nothing, are returned unchanged. `tag` and
    /// `time` identify the record in warnings.
    pub fn filter(&self, tag: &str, time: DateTime<Utc>, record: Record) -> Record {
        let raw = self.key_path.get(&record);
        let ip = match classify(raw, self.config.skip_private_ip) {
            IpClass::Routable(ip) => ip,
            IpClass::Absent => {
                self.stats.increment_info(InfoType::MissingIp);
                return record;
            }
            IpClass::Invalid(value) => {
                log::debug!("[{}] {}: ignoring invalid IP {}", tag, time.to_rfc3339(), value);
                self.stats.increment_warning(WarningType::InvalidIp);
                return record;
            }
            IpClass::Private(ip) => {
                log::debug!("[{}] {}: skipping private IP {}", tag, time.to_rfc3339(), ip);
                self.stats.increment_info(InfoType::PrivateIp);
                return record;
            }
        };
        // Keyed by the field's text, not the parsed address
        let key = raw.and_then(Value::as_str).unwrap_or_default().to_string();

        let looked_up = self.cache.try_get_or_compute(&key, || {
            self.provider
                .lookup(ip)
                .map(|found| normalize(found.as_ref()))
        });

        match looked_up {
            Ok(canonical) if canonical.is_empty() => {
                self.stats.increment_info(InfoType::NoGeoData);
                record
            }
            Ok(canonical) => {
                self.stats.increment_info(InfoType::Enriched);
                merge(record, &self.config.out_key, &canonical, self.config.flatten)
            }
            Err(e) => {
                log::warn!("[{}] {}: {}", tag, time.to_rfc3339(), e);
                self.stats.increment_error(ErrorType::LookupFailure);
                record
            }
        }
    }

    /// Stops the stage, releasing the provider and deleting any unpacked
    /// database file. Deletion failures are logged.
    pub fn shutdown(self) {
        let GeoIpFilter {
            provider,
            artifact,
            cache,
            ..
        } = self;
        let cache_stats = cache.stats();
        drop(provider);
        if let Some(mut artifact) = artifact {
            artifact.release();
        }
        log::info!(
            "GeoIP filter stopped ({} cache hits, {} misses)",
            cache_stats.hits,
            cache_stats.misses
        );
    }

    /// Counters of per-record outcomes.
    pub fn stats(&self) -> Arc<ProcessingStats> {
        Arc::clone(&self.stats)
    }

    /// Enrichment cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of addresses currently cached.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Startup diagnostics; `None` for stages built with `with_provider`.
    pub fn diagnostics(&self) -> Option<&LoadDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// Configuration the stage was started with.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::fake::StaticProvider;
    use crate::geoip::{Names, RawCountry, RawGeoRecord, RawLocation};
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("Expected object, got {}", other),
        }
    }

    fn us() -> RawGeoRecord {
        RawGeoRecord {
            country: Some(RawCountry {
                iso_code: Some("US".to_string()),
                names: Names::default(),
            }),
            ..Default::default()
        }
    }

    fn provider() -> Arc<StaticProvider> {
        Arc::new(
            StaticProvider::default()
                .with("128.101.101.101", us())
                .with(
                    "81.2.69.142",
                    RawGeoRecord {
                        location: Some(RawLocation {
                            time_zone: Some("Europe/London".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                )
                .with("10.0.0.5", us())
                .failing_on("198.51.100.7"),
        )
    }

    fn stage(config: FilterConfig, provider: &Arc<StaticProvider>) -> GeoIpFilter {
        GeoIpFilter::with_provider(config, Arc::clone(provider)).unwrap()
    }

    fn run(filter: &GeoIpFilter, value: Value) -> Value {
        Value::Object(filter.filter("test.geoip", Utc::now(), record(value)))
    }

    #[test]
    fn test_enriches_nested() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        assert_eq!(
            run(&filter, json!({"client_ip": "128.101.101.101"})),
            json!({"client_ip": "128.101.101.101", "geo": {"country": {"code": "US"}}})
        );
        assert_eq!(filter.stats().get_info_count(InfoType::Enriched), 1);
    }

    #[test]
    fn test_enriches_flattened() {
        let provider = provider();
        let config = FilterConfig {
            flatten: true,
            ..Default::default()
        };
        let filter = stage(config, &provider);
        assert_eq!(
            run(&filter, json!({"client_ip": "128.101.101.101"})),
            json!({"client_ip": "128.101.101.101", "geo_country_code": "US"})
        );
    }

    #[test]
    fn test_absent_ip_leaves_record_unchanged() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        for input in [
            json!({"msg": "no ip"}),
            json!({"client_ip": null}),
            json!({"client_ip": ""}),
            json!({"client_ip": "-"}),
        ] {
            assert_eq!(run(&filter, input.clone()), input);
        }
        assert_eq!(provider.calls(), 0);
        assert_eq!(filter.stats().get_info_count(InfoType::MissingIp), 4);
    }

    #[test]
    fn test_invalid_ip_is_skipped() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        let input = json!({"client_ip": "999.1.1.1"});
        assert_eq!(run(&filter, input.clone()), input);
        assert_eq!(provider.calls(), 0);
        assert_eq!(filter.stats().get_warning_count(WarningType::InvalidIp), 1);
    }

    #[test]
    fn test_private_ip_policy() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        let input = json!({"client_ip": "10.0.0.5"});
        assert_eq!(run(&filter, input.clone()), input);
        assert_eq!(provider.calls(), 0);
        assert_eq!(filter.stats().get_info_count(InfoType::PrivateIp), 1);

        let config = FilterConfig {
            skip_private_ip: false,
            ..Default::default()
        };
        let filter = stage(config, &provider);
        assert_eq!(
            run(&filter, input),
            json!({"client_ip": "10.0.0.5", "geo": {"country": {"code": "US"}}})
        );
    }

    #[test]
    fn test_no_data_leaves_record_unchanged() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        let input = json!({"client_ip": "203.0.113.9", "msg": "hello"});
        assert_eq!(run(&filter, input.clone()), input);
        assert_eq!(run(&filter, input.clone()), input);
        // Negative result cached
        assert_eq!(provider.calls(), 1);
        assert_eq!(filter.stats().get_info_count(InfoType::NoGeoData), 2);
    }

    #[test]
    fn test_lookup_failure_is_recovered() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        let input = json!({"client_ip": "198.51.100.7"});
        assert_eq!(run(&filter, input.clone()), input);
        assert_eq!(run(&filter, input.clone()), input);
        // Failures are retried, not cached
        assert_eq!(provider.calls(), 2);
        assert_eq!(filter.stats().get_error_count(ErrorType::LookupFailure), 2);

        // Later records still enriched
        assert!(run(&filter, json!({"client_ip": "128.101.101.101"}))
            .get("geo")
            .is_some());
    }

    #[test]
    fn test_repeated_ip_hits_cache() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        for _ in 0..5 {
            run(&filter, json!({"client_ip": "128.101.101.101"}));
        }
        assert_eq!(provider.calls(), 1);
        assert_eq!(filter.cache_stats().hits, 4);
        assert_eq!(filter.cached_entries(), 1);
    }

    #[test]
    fn test_nested_key_name_and_custom_out_key() {
        let provider = provider();
        let config = FilterConfig {
            key_name: "$.request.remote_ip".to_string(),
            out_key: "location".to_string(),
            ..Default::default()
        };
        let filter = stage(config, &provider);
        assert_eq!(
            run(&filter, json!({"request": {"remote_ip": "81.2.69.142"}})),
            json!({
                "request": {"remote_ip": "81.2.69.142"},
                "location": {"timezone": "Europe/London"}
            })
        );
    }

    #[test]
    fn test_with_provider_rejects_invalid_config() {
        let config = FilterConfig {
            cache_size: 0,
            ..Default::default()
        };
        let err = GeoIpFilter::with_provider(config, StaticProvider::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidOption {
                option: "cache_size",
                ..
            }
        ));
    }

    #[test]
    fn test_filter_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GeoIpFilter>();
    }

    #[test]
    fn test_shutdown_without_artifact() {
        let provider = provider();
        let filter = stage(FilterConfig::default(), &provider);
        assert!(filter.diagnostics().is_none());
        filter.shutdown();
    }
}
