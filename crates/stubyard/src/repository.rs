//! Stub repository.
//!
//! Holds the active generation of lifecycle records behind an `ArcSwap`.
//! Request handlers load the current snapshot without locking; a reload
//! builds a complete new snapshot and publishes it with a single pointer
//! swap, so a handler sees either the old list or the new one, never a mix.

use crate::cache::{CacheConfig, CacheStats, Fingerprint, ResultCache};
use crate::matcher::matches;
use crate::model::StubLifecycle;
use crate::request::IncomingRequest;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One immutable generation of records plus facts derived from it.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    records: Vec<StubLifecycle>,
    loaded_at: DateTime<Utc>,
    /// Header names constrained by at least one record
    relevant_headers: BTreeSet<String>,
    /// Whether at least one record constrains the request body
    matches_body: bool,
}

impl Snapshot {
    fn new(generation: u64, records: Vec<StubLifecycle>) -> Self {
        let relevant_headers = records
            .iter()
            .flat_map(|record| record.request().headers().keys().cloned())
            .collect();
        let matches_body = records.iter().any(|record| record.request().post().is_some());

        Self {
            generation,
            records,
            loaded_at: Utc::now(),
            relevant_headers,
            matches_body,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[StubLifecycle] {
        &self.records
    }

    pub fn get(&self, id: usize) -> Option<&StubLifecycle> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn relevant_headers(&self) -> &BTreeSet<String> {
        &self.relevant_headers
    }

    pub fn matches_body(&self) -> bool {
        self.matches_body
    }

    /// Files the records were built from, besides the data file itself.
    pub fn referenced_files(&self) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();
        for record in &self.records {
            if let Some(file) = record.request().file() {
                files.insert(file.clone());
            }
            files.extend(record.responses().iter().filter_map(|r| r.file().cloned()));
        }
        files
    }

    fn scan(&self, request: &IncomingRequest) -> Option<usize> {
        self.records
            .iter()
            .position(|record| matches(record.request(), request))
    }
}

/// A record selected for a request.
///
/// Keeps its snapshot alive, so it stays valid across a concurrent reload.
#[derive(Debug, Clone)]
pub struct StubMatch {
    snapshot: Arc<Snapshot>,
    index: usize,
    cached: bool,
}

impl StubMatch {
    pub fn record(&self) -> &StubLifecycle {
        &self.snapshot.records[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    /// Whether the match came from the result cache.
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

/// Owner of the active snapshot and the result cache.
pub struct StubRepository {
    current: ArcSwap<Snapshot>,
    generation: AtomicU64,
    cache: ResultCache,
    /// Serializes writers so generations are published in order
    reload_lock: Mutex<()>,
}

impl StubRepository {
    /// Create an empty repository (generation 0).
    pub fn new(cache: CacheConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::new(0, Vec::new())),
            generation: AtomicU64::new(0),
            cache: ResultCache::new(cache),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a repository already holding `records` as generation 1.
    pub fn with_records(cache: CacheConfig, records: Vec<StubLifecycle>) -> Self {
        let repository = Self::new(cache);
        repository.reload(records);
        repository
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Publish a new generation of records and return its number.
    pub fn reload(&self, records: Vec<StubLifecycle>) -> u64 {
        let _guard = self.reload_lock.lock();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let count = records.len();

        self.current.store(Arc::new(Snapshot::new(generation, records)));
        // Entries stored after this by in-flight lookups carry the old generation
        self.cache.invalidate_all();

        info!("Loaded generation {} with {} stub(s)", generation, count);
        generation
    }

    /// Find the first record matching `request`, consulting the cache first.
    pub fn find(&self, request: &IncomingRequest) -> Option<StubMatch> {
        let snapshot = self.current.load_full();
        let fingerprint = self.cache.is_enabled().then(|| {
            Fingerprint::new(request, &snapshot.relevant_headers, snapshot.matches_body)
        });

        if let Some(fingerprint) = &fingerprint {
            match self.cache.lookup(fingerprint, snapshot.generation) {
                Some(index) if index < snapshot.records.len() => {
                    debug!("Cache hit: {} -> stub {}", request, index);
                    return Some(StubMatch {
                        snapshot,
                        index,
                        cached: true,
                    });
                }
                Some(_) => self.cache.remove(fingerprint),
                None => debug!("Cache miss: {}", request),
            }
        }

        let index = snapshot.scan(request)?;
        debug!("Matched {} -> stub {}", request, index);
        if let Some(fingerprint) = fingerprint {
            self.cache.store(fingerprint, snapshot.generation, index);
        }
        Some(StubMatch {
            snapshot,
            index,
            cached: false,
        })
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl std::fmt::Debug for StubRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubRepository")
            .field("generation", &self.generation.load(Ordering::Acquire))
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
