//! In-memory image cache with LRU eviction.

use crate::decoded::DecodedImage;
use crate::ports::{CacheError, CacheLookup, CacheTier, ImageCache};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, trace};

/// Entry in the memory cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    image: DecodedImage,
    /// Decoded size, fixed at insert time
    cost: usize,
    /// Last access time for LRU eviction
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(image: DecodedImage) -> Self {
        Self {
            cost: image.byte_cost(),
            image,
            last_accessed: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Hit/miss/eviction counters for a [`MemoryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub size_bytes: usize,
}

impl MemoryCacheStats {
    /// Fraction of lookups that hit (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, CacheEntry>,
    size_bytes: usize,
    stats: MemoryCacheStats,
}

/// In-memory cache of decoded images.
///
/// Bounded by the decoded byte cost of the stored images; when a store would
/// exceed the limit, least recently used entries are evicted first. Hits are
/// reported as [`CacheTier::MemoryHit`].
#[derive(Debug)]
pub struct MemoryCache {
    state: Mutex<State>,
    max_size_bytes: usize,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_size_bytes` of decoded pixels.
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            max_size_bytes,
        }
    }

    /// Returns the cached image for `key`, refreshing its access time.
    pub fn get(&self, key: &str) -> Option<DecodedImage> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                let image = entry.image.clone();
                state.stats.hits += 1;
                Some(image)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts `image` under `key`, evicting LRU entries to make room.
    pub fn put(&self, key: impl Into<String>, image: DecodedImage) -> Result<(), CacheError> {
        let entry = CacheEntry::new(image);
        if entry.cost > self.max_size_bytes {
            return Err(CacheError::TooLarge {
                size: entry.cost,
                capacity: self.max_size_bytes,
            });
        }

        let key = key.into();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(previous) = state.entries.remove(&key) {
            state.size_bytes = state.size_bytes.saturating_sub(previous.cost);
        }

        let target = self.max_size_bytes - entry.cost;
        let evicted = Self::evict_lru_until(state, target);
        if evicted > 0 {
            debug!(evicted, size_bytes = state.size_bytes, "Memory cache evicted entries");
        }

        state.size_bytes += entry.cost;
        trace!(key = %key, cost = entry.cost, "Memory cache store");
        state.entries.insert(key, entry);
        state.stats.entries = state.entries.len();
        state.stats.size_bytes = state.size_bytes;

        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<DecodedImage> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let entry = state.entries.remove(key)?;
        state.size_bytes = state.size_bytes.saturating_sub(entry.cost);
        state.stats.entries = state.entries.len();
        state.stats.size_bytes = state.size_bytes;
        Some(entry.image)
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.state.lock().size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn stats(&self) -> MemoryCacheStats {
        self.state.lock().stats
    }

    pub fn clear(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.entries.clear();
        state.size_bytes = 0;
        state.stats.entries = 0;
        state.stats.size_bytes = 0;
    }

    /// Evicts least recently used entries until the cache holds at most
    /// `target` bytes. Returns the number of entries evicted.
    fn evict_lru_until(state: &mut State, target: usize) -> usize {
        if state.size_bytes <= target {
            return 0;
        }

        let mut entries: Vec<(String, Instant, usize)> = state
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed, v.cost))
            .collect();
        entries.sort_by_key(|(_, accessed, _)| *accessed);

        let mut evicted = 0;
        for (key, _, cost) in entries {
            if state.size_bytes <= target {
                break;
            }
            state.entries.remove(&key);
            state.size_bytes = state.size_bytes.saturating_sub(cost);
            evicted += 1;
        }

        state.stats.evictions += evicted as u64;
        evicted
    }
}

impl ImageCache for MemoryCache {
    fn lookup(&self, key: &str) -> impl Future<Output = CacheLookup> + Send {
        let lookup = match self.get(key) {
            Some(image) => CacheLookup::hit(image, CacheTier::MemoryHit),
            None => CacheLookup::miss(),
        };
        std::future::ready(lookup)
    }

    fn store(
        &self,
        key: &str,
        image: DecodedImage,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        std::future::ready(self.put(key, image))
    }
}

/// Cache that never holds anything.
///
/// Every lookup misses and every store is accepted and discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

impl NoOpCache {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCache for NoOpCache {
    fn lookup(&self, _key: &str) -> impl Future<Output = CacheLookup> + Send {
        std::future::ready(CacheLookup::miss())
    }

    fn store(
        &self,
        _key: &str,
        _image: DecodedImage,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        std::future::ready(Ok(()))
    }
}
