//! Bounded light cache shared by every connection.
//!
//! Entries are keyed by [`cache_key`] and copied in and out so that no
//! caller ever aliases stored light. When the cache is full, the oldest
//! quarter of its entries (by insertion stamp, at least one) is evicted
//! before the new entry goes in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use voxbridge_voxel::LightProperties;

use crate::cache_key::cache_key;
use crate::engine::{LightInput, compute_block_light, compute_light, compute_sky_light};
use crate::error::LightError;
use crate::light_array::{ChunkLight, LightData};
use crate::workers::LightWorkers;

/// A copy of one cached computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub sky: LightData,
    pub block: LightData,
    /// Insertion order; larger is newer.
    pub stamp: u64,
}

impl CacheEntry {
    pub fn into_light(self) -> ChunkLight {
        ChunkLight {
            sky: self.sky,
            block: self.block,
        }
    }
}

/// Concurrent, size-bounded map from cache key to computed light.
pub struct LightCache {
    entries: DashMap<u64, CacheEntry>,
    max_entries: usize,
    clock: AtomicU64,
    /// Serialises evict-then-insert so the bound holds under contention.
    insert_lock: Mutex<()>,
    workers: Option<LightWorkers>,
}

impl LightCache {
    /// A cache computing misses on the calling thread.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            clock: AtomicU64::new(0),
            insert_lock: Mutex::new(()),
            workers: None,
        }
    }

    /// A cache whose misses are computed on `threads` workers.
    ///
    /// `threads == 0` keeps computation inline.
    pub fn with_workers(max_entries: usize, threads: usize) -> Result<Self, LightError> {
        let mut cache = Self::new(max_entries);
        if threads > 0 {
            cache.workers = Some(LightWorkers::new(threads)?);
        }
        Ok(cache)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of light worker threads (0 when computing inline).
    pub fn worker_threads(&self) -> usize {
        self.workers.as_ref().map_or(0, LightWorkers::threads)
    }

    /// A copy of the entry stored under `key`.
    pub fn get(&self, key: u64) -> Option<CacheEntry> {
        self.entries.get(&key).map(|e| e.value().clone())
    }

    /// Stores copies of `sky` and `block` under `key`, replacing any
    /// previous entry.
    pub fn put(&self, key: u64, sky: &LightData, block: &LightData) {
        if self.max_entries == 0 {
            return;
        }
        let _guard = self.insert_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            CacheEntry {
                sky: sky.clone(),
                block: block.clone(),
                stamp,
            },
        );
    }

    pub fn invalidate(&self, key: u64) {
        self.entries.remove(&key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes the oldest `max(max_entries / 4, 1)` entries.
    fn evict_oldest(&self) {
        let mut stamps: Vec<u64> = self.entries.iter().map(|e| e.value().stamp).collect();
        if stamps.is_empty() {
            return;
        }
        let evict = (self.max_entries / 4).max(1).min(stamps.len());
        let (_, cutoff, _) = stamps.select_nth_unstable(evict - 1);
        let cutoff = *cutoff;
        self.entries.retain(|_, e| e.stamp > cutoff);
        tracing::trace!(evicted = evict, remaining = self.entries.len(), "light cache eviction");
    }

    /// Returns the cached light for `input`, computing and storing it on a miss.
    ///
    /// With workers, the sky and block halves are computed in parallel and
    /// both are awaited before returning.
    pub fn get_or_compute<P>(&self, input: &LightInput, props: &Arc<P>) -> ChunkLight
    where
        P: LightProperties + Send + Sync + ?Sized + 'static,
    {
        let key = cache_key(input);
        if let Some(entry) = self.get(key) {
            tracing::trace!(key, "light cache hit");
            return entry.into_light();
        }

        let light = match &self.workers {
            Some(workers) => compute_on(workers, input, props),
            None => compute_light(input, props.as_ref()),
        };
        self.put(key, &light.sky, &light.block);
        light
    }
}

fn compute_on<P>(workers: &LightWorkers, input: &LightInput, props: &Arc<P>) -> ChunkLight
where
    P: LightProperties + Send + Sync + ?Sized + 'static,
{
    let sky = {
        let (input, props) = (input.clone(), Arc::clone(props));
        workers.submit(move || compute_sky_light(&input, props.as_ref()))
    };
    let block = {
        let (input, props) = (input.clone(), Arc::clone(props));
        workers.submit(move || compute_block_light(&input, props.as_ref()))
    };

    let sky = sky
        .and_then(|rx| rx.recv().ok())
        .unwrap_or_else(|| compute_sky_light(input, props.as_ref()));
    let block = block
        .and_then(|rx| rx.recv().ok())
        .unwrap_or_else(|| compute_block_light(input, props.as_ref()));
    ChunkLight { sky, block }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
