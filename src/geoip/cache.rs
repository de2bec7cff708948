//! Enrichment cache.
//!
//! A capacity- and TTL-bounded LRU map from raw IP strings to normalized
//! records. Negative results (nothing found) are cached like positive ones.
//!
//! Concurrency: the LRU map sits behind one mutex that is never held while a
//! value is computed. Computation is single-flight per key: callers racing
//! on the same missing key queue on a per-key lock, and all but the first
//! find the value already cached when they get it.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::enrich::CanonicalGeoRecord;

struct CacheEntry {
    value: Arc<CanonicalGeoRecord>,
    inserted_at: Instant,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a live entry
    pub hits: u64,
    /// Lookups that ran the computation
    pub misses: u64,
    /// Entries found but past their TTL
    pub expired: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL + LRU memoization in front of the lookup provider.
pub struct GeoCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

// Poisoning only means another caller panicked mid-operation; the LRU map
// itself is still structurally sound.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl GeoCache {
    /// Creates a cache holding at most `capacity` entries, each live for `ttl`.
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            inflight: Mutex::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Returns the cached record for `ip`, computing and storing it on a miss.
    ///
    /// `compute` runs at most once per miss; concurrent callers for the same
    /// key wait for it rather than computing again.
    pub fn get_or_compute<F>(&self, ip: &str, compute: F) -> Arc<CanonicalGeoRecord>
    where
        F: FnOnce() -> CanonicalGeoRecord,
    {
        match self.try_get_or_compute_at(ip, Instant::now, || {
            Ok::<_, std::convert::Infallible>(compute())
        }) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like `get_or_compute`, but a failed computation is returned to the
    /// caller and nothing is stored.
    pub fn try_get_or_compute<F, E>(
        &self,
        ip: &str,
        compute: F,
    ) -> Result<Arc<CanonicalGeoRecord>, E>
    where
        F: FnOnce() -> Result<CanonicalGeoRecord, E>,
    {
        self.try_get_or_compute_at(ip, Instant::now, compute)
    }

    /// `try_get_or_compute` against an explicit clock.
    pub(crate) fn try_get_or_compute_at<C, F, E>(
        &self,
        ip: &str,
        now: C,
        compute: F,
    ) -> Result<Arc<CanonicalGeoRecord>, E>
    where
        C: Fn() -> Instant,
        F: FnOnce() -> Result<CanonicalGeoRecord, E>,
    {
        if let Some(value) = self.get_live(ip, now()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let key_lock = {
            let mut inflight = lock(&self.inflight);
            Arc::clone(inflight.entry(ip.to_string()).or_default())
        };
        let computing = lock(&key_lock);

        // Whoever held the key lock before us may have filled the entry
        let result = match self.get_live(ip, now()) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                compute().map(|computed| self.insert(ip, computed, now()))
            }
        };
        drop(computing);

        {
            let mut inflight = lock(&self.inflight);
            if inflight
                .get(ip)
                .is_some_and(|current| Arc::ptr_eq(current, &key_lock))
            {
                inflight.remove(ip);
            }
        }

        result
    }

    fn insert(
        &self,
        ip: &str,
        value: CanonicalGeoRecord,
        now: Instant,
    ) -> Arc<CanonicalGeoRecord> {
        let value = Arc::new(value);
        let mut entries = lock(&self.entries);
        if let Some((evicted, _)) = entries.push(
            ip.to_string(),
            CacheEntry {
                value: Arc::clone(&value),
                inserted_at: now,
            },
        ) {
            if evicted != ip {
                log::trace!("Evicted {} from GeoIP cache", evicted);
            }
        }
        value
    }

    /// Looks up a live entry, promoting it to most recently used. An expired
    /// entry is removed on the spot.
    fn get_live(&self, ip: &str, now: Instant) -> Option<Arc<CanonicalGeoRecord>> {
        let mut entries = lock(&self.entries);
        let expired = match entries.get(ip) {
            None => return None,
            Some(entry) if now.saturating_duration_since(entry.inserted_at) < self.ttl => {
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
        };
        if expired {
            entries.pop(ip);
            self.expired.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    /// Number of stored entries, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `ip` is stored, without affecting recency or expiry.
    pub fn contains(&self, ip: &str) -> bool {
        lock(&self.entries).contains(ip)
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
