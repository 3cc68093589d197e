//! Stream-URL cache
//!
//! Maps a `TrackRef` to its resolved `StreamCandidate` for a fixed TTL.
//! Expiry is checked lazily on lookup; total size is bounded by an LRU cap.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::api::{StreamCandidate, TrackRef};

/// How long a resolved candidate stays valid
pub const STREAM_URL_TTL: Duration = Duration::from_secs(5 * 60);

/// Default entry cap
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug)]
struct CacheEntry {
    candidate: StreamCandidate,
    created_at: Instant,
}

/// Process-wide, mutex-guarded TTL cache of resolved stream URLs
pub struct StreamUrlCache {
    entries: Mutex<LruCache<TrackRef, CacheEntry>>,
    ttl: Duration,
}

impl std::fmt::Debug for StreamUrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamUrlCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Default for StreamUrlCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StreamUrlCache {
    /// Create a cache holding at most `capacity` tracks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: STREAM_URL_TTL,
        }
    }

    /// Look up a fresh candidate; a stale entry is evicted and reported as a miss
    pub fn get(&self, key: &TrackRef) -> Option<StreamCandidate> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.created_at.elapsed() < self.ttl => {
                return Some(entry.candidate.clone());
            }
            Some(_) => {}
            None => return None,
        }
        debug!("Stream URL cache entry for {} expired", key);
        entries.pop(key);
        None
    }

    /// Store a candidate, overwriting any existing entry for `key`
    pub fn put(&self, key: TrackRef, candidate: StreamCandidate) {
        self.entries.lock().put(
            key,
            CacheEntry {
                candidate,
                created_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `key`, if any
    pub fn invalidate(&self, key: &TrackRef) {
        self.entries.lock().pop(key);
    }

    /// Number of stored entries, including ones not yet found stale
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
