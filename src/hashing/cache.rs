// src/hashing/cache.rs
use log::info;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::hashing::perceptual::ImageHash;

/// Bounded least-recently-used memo of image hashes keyed by (url, hash size).
///
/// A cached `None` records a fetch or decode failure, so the URL is not
/// requested again while the entry stays resident.
pub struct ImageHashCache {
    entries: LruCache<(String, u32), Option<ImageHash>>,

    // Stats
    pub hits: usize,
    pub misses: usize,
}

impl ImageHashCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        info!("Initializing ImageHashCache with capacity: {}", capacity);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// `Some(entry)` on a hit, where the entry itself is `None` for a cached failure.
    pub fn get(&mut self, url: &str, hash_size: u32) -> Option<Option<ImageHash>> {
        match self.entries.get(&(url.to_string(), hash_size)) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Checks residency without touching recency or counters.
    pub fn contains(&self, url: &str, hash_size: u32) -> bool {
        self.entries.contains(&(url.to_string(), hash_size))
    }

    pub fn put(&mut self, url: &str, hash_size: u32, hash: Option<ImageHash>) {
        self.entries.put((url.to_string(), hash_size), hash);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        info!("Image hash cache cleared");
    }

    pub fn log_stats(&self) {
        let lookups = self.hits + self.misses;
        let hit_rate = if lookups > 0 {
            self.hits as f64 / lookups as f64 * 100.0
        } else {
            0.0
        };
        info!(
            "Image hash cache: {} hits, {} misses ({:.1}% hit rate), {}/{} entries",
            self.hits,
            self.misses,
            hit_rate,
            self.len(),
            self.capacity()
        );
    }
}

/// A thread-safe wrapper for the ImageHashCache
pub type SharedImageHashCache = Arc<Mutex<ImageHashCache>>;

pub fn create_shared_hash_cache(capacity: usize) -> SharedImageHashCache {
    let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
    Arc::new(Mutex::new(ImageHashCache::new(capacity)))
}
