//! Match result cache.
//!
//! Maps a request fingerprint to the index of the record it matched, tagged
//! with the snapshot generation it was computed against. Entries from an
//! older generation are treated as misses and dropped on sight, so a reload
//! never needs to wait for the cache to be cleared.

use crate::request::IncomingRequest;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

/// Entries inspected per eviction.
const EVICTION_SAMPLE: usize = 32;

/// Configuration for the match cache
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Enable match caching
    pub enabled: bool,
    /// Maximum number of entries. Eviction drops the least recently used of
    /// a sample, and concurrent stores may overshoot by one entry per writer
    /// until they finish trimming.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// Cache key derived from the parts of a request that can influence matching.
///
/// Only headers some record constrains are included, and the body is only
/// hashed when some record constrains it. Two requests with equal
/// fingerprints are therefore matched by the same record.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint {
    method: String,
    path: String,
    /// Sorted query pairs
    query: Vec<(String, String)>,
    /// Sorted lowercase header names and values
    headers: Vec<(String, String)>,
    body_hash: Option<u64>,
}

impl Fingerprint {
    pub fn new(
        request: &IncomingRequest,
        relevant_headers: &BTreeSet<String>,
        include_body: bool,
    ) -> Self {
        let query = request
            .query()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let headers = relevant_headers
            .iter()
            .filter_map(|name| {
                request
                    .header(name)
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();
        let body_hash = include_body.then(|| {
            let mut hasher = DefaultHasher::new();
            request.body().as_ref().hash(&mut hasher);
            hasher.finish()
        });

        Self {
            method: request.method().to_string(),
            path: request.path().to_string(),
            query,
            headers,
            body_hash,
        }
    }
}

/// A cached match result.
#[derive(Debug)]
struct CacheEntry {
    generation: u64,
    /// Position of the matched record in its snapshot
    index: usize,
    last_accessed: Instant,
}

/// Counters for cache performance
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub size: usize,
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

/// Fingerprint to record-index cache shared by all request handlers.
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    entries: DashMap<Fingerprint, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        debug!(
            "Creating match cache: enabled={}, max_entries={}",
            config.enabled, config.max_entries
        );
        Self {
            config,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(CacheConfig {
            enabled: false,
            max_entries: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up the record index cached for `fingerprint` under `generation`.
    ///
    /// An entry from any other generation is removed and reported as a miss.
    pub fn lookup(&self, fingerprint: &Fingerprint, generation: u64) -> Option<usize> {
        if !self.config.enabled {
            return None;
        }

        let found = self.entries.get_mut(fingerprint).map(|mut entry| {
            if entry.generation == generation {
                entry.last_accessed = Instant::now();
                Some(entry.index)
            } else {
                None
            }
        });

        match found {
            Some(Some(index)) => {
                trace!("Cache hit for {:?} -> record {}", fingerprint, index);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(index)
            }
            Some(None) => {
                trace!("Stale cache entry for {:?}", fingerprint);
                // Only remove if nobody refreshed it in the meantime
                self.entries
                    .remove_if(fingerprint, |_, entry| entry.generation != generation);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remember that `fingerprint` matched record `index` under `generation`.
    pub fn store(&self, fingerprint: Fingerprint, generation: u64, index: usize) {
        if !self.config.enabled || self.config.max_entries == 0 {
            return;
        }

        self.entries.insert(
            fingerprint,
            CacheEntry {
                generation,
                index,
                last_accessed: Instant::now(),
            },
        );
        self.inserts.fetch_add(1, Ordering::Relaxed);

        while self.entries.len() > self.config.max_entries {
            if !self.evict_sampled() {
                break;
            }
        }
    }

    pub fn remove(&self, fingerprint: &Fingerprint) {
        self.entries.remove(fingerprint);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }

    /// Evict the least recently used of the first `EVICTION_SAMPLE` entries.
    fn evict_sampled(&self) -> bool {
        // Collect the key first; removing while iterating would deadlock the shard
        let oldest = self
            .entries
            .iter()
            .take(EVICTION_SAMPLE)
            .min_by_key(|entry| entry.value().last_accessed)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                if self.entries.remove(&key).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }
}
