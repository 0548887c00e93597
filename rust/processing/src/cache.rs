// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Projection cache
//!
//! Bucketed, TTL-based memoization of producer results. Keys are derived
//! from the parameters that produced a result ([`CacheParams`]): the sorted
//! parameter map is rendered as JSON, hashed with SHA-256 and truncated to
//! 128 bits. Two parameter sets with the same key are the same result.
//!
//! Stored values are immutable snapshots behind `Arc`; the cache is the only
//! state shared between engine invocations and serializes every operation
//! through one mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::drillhole::DrillholeProjection;
use crate::geology::GeologyProjection;
use crate::profile::MasterProfile;
use crate::structure::StructureProjection;

/// Bytes of the SHA-256 digest kept in a key
const KEY_BYTES: usize = 16;

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cached producer result
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Topography(Arc<MasterProfile>),
    Geology(Arc<GeologyProjection>),
    Structures(Arc<StructureProjection>),
    Drillholes(Arc<DrillholeProjection>),
}

/// Bookkeeping attached to an entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMetadata {
    pub created: Instant,
    pub last_hit: Option<Instant>,
    pub hits: u64,
    /// Identifiers of the sources the value was derived from
    pub sources: Vec<String>,
}

/// One stored value
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub bucket: String,
    pub key: String,
    pub data: CachedData,
    /// `None` when the TTL reaches past what an `Instant` can hold
    pub expiry: Option<Instant>,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| now > expiry)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped on read because they had expired
    pub expired: u64,
    /// Entries dropped by an explicit invalidation
    pub invalidated: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct CacheState {
    buckets: FxHashMap<String, FxHashMap<String, CacheEntry>>,
    stats: CacheStats,
}

impl CacheState {
    fn entry_count(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }
}

/// Bucketed TTL cache shared across invocations
pub struct ProjectionCache {
    state: Mutex<CacheState>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ProjectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionCache")
            .field("default_ttl", &self.default_ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ProjectionCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            default_ttl,
            clock,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cache_ttl())
    }

    #[inline]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Values are immutable once stored, so a poisoned lock is still consistent
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `(bucket, key)`. An expired entry is evicted and reported as a miss.
    pub fn get(&self, bucket: &str, key: &str) -> Option<CachedData> {
        let now = self.clock.now();
        let mut state = self.lock();
        let state = &mut *state;

        let Some(entries) = state.buckets.get_mut(bucket) else {
            state.stats.misses += 1;
            tracing::debug!(bucket, key, "Cache miss");
            return None;
        };

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                if entries.is_empty() {
                    state.buckets.remove(bucket);
                }
                state.stats.expired += 1;
                state.stats.misses += 1;
                tracing::debug!(bucket, key, "Cache entry expired");
                None
            }
            Some(entry) => {
                entry.metadata.hits += 1;
                entry.metadata.last_hit = Some(now);
                state.stats.hits += 1;
                tracing::debug!(bucket, key, hits = entry.metadata.hits, "Cache hit");
                Some(entry.data.clone())
            }
            None => {
                state.stats.misses += 1;
                tracing::debug!(bucket, key, "Cache miss");
                None
            }
        }
    }

    /// Stores a value, replacing any previous value under `(bucket, key)`
    pub fn set(&self, bucket: &str, key: &str, data: CachedData, ttl: Option<Duration>) {
        self.set_with_sources(bucket, key, data, ttl, Vec::new());
    }

    /// Stores a value and records the sources it was derived from
    pub fn set_with_sources(
        &self,
        bucket: &str,
        key: &str,
        data: CachedData,
        ttl: Option<Duration>,
        sources: Vec<String>,
    ) {
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            bucket: bucket.to_string(),
            key: key.to_string(),
            data,
            expiry: now.checked_add(ttl),
            metadata: EntryMetadata {
                created: now,
                last_hit: None,
                hits: 0,
                sources,
            },
        };

        let mut state = self.lock();
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        tracing::debug!(bucket, key, ttl_secs = ttl.as_secs(), "Cached result");
    }

    /// Drops entries. No bucket and no key clears everything; a bucket without
    /// a key clears that bucket; a key without a bucket drops it from every
    /// bucket. Returns the number of entries removed.
    pub fn invalidate(&self, bucket: Option<&str>, key: Option<&str>) -> usize {
        let mut state = self.lock();
        let removed = match (bucket, key) {
            (None, None) => {
                let n = state.entry_count();
                state.buckets.clear();
                n
            }
            (Some(bucket), None) => state.buckets.remove(bucket).map_or(0, |b| b.len()),
            (Some(bucket), Some(key)) => {
                let removed = state
                    .buckets
                    .get_mut(bucket)
                    .and_then(|b| b.remove(key))
                    .map_or(0, |_| 1);
                state.buckets.retain(|_, b| !b.is_empty());
                removed
            }
            (None, Some(key)) => {
                let removed = state
                    .buckets
                    .values_mut()
                    .filter_map(|b| b.remove(key))
                    .count();
                state.buckets.retain(|_, b| !b.is_empty());
                removed
            }
        };
        state.stats.invalidated += removed as u64;
        tracing::debug!(?bucket, ?key, removed, "Cache invalidated");
        removed
    }

    /// Drops every entry derived from the given source
    pub fn invalidate_source(&self, source_id: &str) -> usize {
        let mut state = self.lock();
        let mut removed = 0;
        for entries in state.buckets.values_mut() {
            let before = entries.len();
            entries.retain(|_, e| !e.metadata.sources.iter().any(|s| s == source_id));
            removed += before - entries.len();
        }
        state.buckets.retain(|_, b| !b.is_empty());
        state.stats.invalidated += removed as u64;
        tracing::debug!(source_id, removed, "Cache entries for source invalidated");
        removed
    }

    /// Eagerly drops every expired entry
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let mut removed = 0;
        for entries in state.buckets.values_mut() {
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(now));
            removed += before - entries.len();
        }
        state.buckets.retain(|_, b| !b.is_empty());
        state.stats.expired += removed as u64;
        removed
    }

    /// Metadata of a live entry, without counting a hit
    pub fn metadata(&self, bucket: &str, key: &str) -> Option<EntryMetadata> {
        let state = self.lock();
        state
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|e| e.metadata.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entry_count(),
            ..state.stats
        }
    }
}

/// Parameters a cached result depends on
///
/// Large inputs (layers, rasters) enter the key as their source id and
/// revision, never by content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheParams {
    values: BTreeMap<String, Value>,
    sources: Vec<String>,
}

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Adds any serializable value. A value that cannot be rendered is keyed
    /// by its serialization error, never as null.
    pub fn serialized<T: Serialize>(mut self, name: &str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            tracing::warn!(param = name, error = %e, "Cache parameter not serializable");
            Value::String(format!("unserializable: {}", e))
        });
        self.values.insert(name.to_string(), value);
        self
    }

    /// Adds a source by id and revision and records it for source invalidation
    pub fn source(mut self, name: &str, id: &str, revision: u64) -> Self {
        self.values.insert(
            name.to_string(),
            serde_json::json!({ "id": id, "revision": revision }),
        );
        if !self.sources.iter().any(|s| s == id) {
            self.sources.push(id.to_string());
        }
        self
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Canonical rendering: keys sorted, JSON encoded
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.values).unwrap_or_default()
    }

    /// 128-bit hex key of the canonical rendering
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..KEY_BYTES])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsection_core::ProfilePoint;

    fn profile(elevation: f64) -> CachedData {
        CachedData::Topography(Arc::new(MasterProfile::from_points(vec![
            ProfilePoint::new(0.0, elevation),
            ProfilePoint::new(10.0, elevation),
        ])))
    }

    fn cache_with_clock() -> (ProjectionCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = ProjectionCache::with_clock(Duration::from_secs(3600), clock.clone());
        (cache, clock)
    }

    #[test]
    fn round_trip() {
        let (cache, _) = cache_with_clock();
        cache.set("topography", "k", profile(50.0), None);
        assert_eq!(cache.get("topography", "k"), Some(profile(50.0)));
        assert_eq!(cache.get("geology", "k"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn expired_entry_is_a_miss_and_frees_the_slot() {
        let (cache, clock) = cache_with_clock();
        cache.set("topography", "k", profile(50.0), Some(Duration::from_secs(10)));

        clock.advance(Duration::from_secs(10));
        assert!(cache.get("topography", "k").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("topography", "k").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn default_ttl_applies() {
        let (cache, clock) = cache_with_clock();
        cache.set("topography", "k", profile(1.0), None);
        clock.advance(Duration::from_secs(3599));
        assert!(cache.get("topography", "k").is_some());
        clock.advance(Duration::from_secs(2));
        assert!(cache.get("topography", "k").is_none());
    }

    #[test]
    fn unbounded_ttl_never_expires() {
        let (cache, clock) = cache_with_clock();
        cache.set("topography", "k", profile(1.0), Some(Duration::MAX));
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));
        assert!(cache.get("topography", "k").is_some());
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn unserializable_param_is_not_null() {
        // Tuple keys cannot become JSON object keys
        let mut odd = std::collections::HashMap::new();
        odd.insert((1, 2), 3);
        let failed = CacheParams::new().serialized("p", &odd);
        let null = CacheParams::new().param("p", Value::Null);
        assert_ne!(failed.key(), null.key());
        assert!(failed.canonical().contains("unserializable"));
    }

    #[test]
    fn one_value_per_bucket_and_key() {
        let (cache, _) = cache_with_clock();
        cache.set("topography", "k", profile(1.0), None);
        cache.set("topography", "k", profile(2.0), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("topography", "k"), Some(profile(2.0)));
    }

    #[test]
    fn colliding_keys_share_a_result() {
        // Parameter order does not matter; equal keys return the stored value
        let a = CacheParams::new().param("band", 1u64).param("interval", 5.0);
        let b = CacheParams::new().param("interval", 5.0).param("band", 1u64);
        assert_eq!(a.key(), b.key());

        let (cache, _) = cache_with_clock();
        cache.set("topography", &a.key(), profile(7.0), None);
        assert_eq!(cache.get("topography", &b.key()), Some(profile(7.0)));
    }

    #[test]
    fn keys_are_128_bit_hex() {
        let key = CacheParams::new().param("x", "y").key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, CacheParams::new().param("x", "z").key());
    }

    #[test]
    fn invalidate_scopes() {
        let (cache, _) = cache_with_clock();
        cache.set("topography", "a", profile(1.0), None);
        cache.set("topography", "b", profile(1.0), None);
        cache.set("geology", "a", profile(1.0), None);

        assert_eq!(cache.invalidate(Some("topography"), Some("a")), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.invalidate(None, Some("a")), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.invalidate(Some("topography"), None), 1);
        assert!(cache.is_empty());

        cache.set("topography", "a", profile(1.0), None);
        cache.set("geology", "b", profile(1.0), None);
        assert_eq!(cache.invalidate(None, None), 2);
        assert_eq!(cache.stats().invalidated, 5);
    }

    #[test]
    fn invalidate_by_source() {
        let (cache, _) = cache_with_clock();
        let params = CacheParams::new()
            .source("raster", "dem", 0)
            .source("outcrops", "geology-layer", 3);
        assert_eq!(params.sources(), ["dem", "geology-layer"]);

        cache.set_with_sources("geology", &params.key(), profile(1.0), None, params.sources().to_vec());
        cache.set_with_sources("topography", "t", profile(1.0), None, vec!["dem".into()]);
        cache.set("structures", "s", profile(1.0), None);

        assert_eq!(cache.invalidate_source("geology-layer"), 1);
        assert_eq!(cache.invalidate_source("dem"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn revision_changes_key() {
        let a = CacheParams::new().source("outcrops", "layer", 1);
        let b = CacheParams::new().source("outcrops", "layer", 2);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn purge_and_metadata() {
        let (cache, clock) = cache_with_clock();
        cache.set("topography", "old", profile(1.0), Some(Duration::from_secs(1)));
        cache.set("topography", "new", profile(1.0), Some(Duration::from_secs(100)));
        cache.get("topography", "new");
        assert_eq!(cache.metadata("topography", "new").unwrap().hits, 1);

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn shared_across_threads() {
        let cache = Arc::new(ProjectionCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let key = format!("k{}", i % 2);
                    cache.set("topography", &key, profile(i as f64), None);
                    cache.get("topography", &key).is_some()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.len(), 2);
    }
}
