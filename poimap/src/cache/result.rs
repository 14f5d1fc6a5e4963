//! In-memory result cache with TTL staleness.
//!
//! Backed by a `DashMap`, so lookups and writes never block an async task
//! for longer than a shard lock. Entries are never mutated, only replaced;
//! concurrent writers to the same key simply overwrite (last writer wins).
//!
//! Stale entries are ignored on read rather than evicted. There is no size
//! bound: the key space grows with the number of distinct viewports visited
//! during the life of the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::key::CacheKey;
use crate::model::GeoPoint;

/// Default time-to-live for cached results (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// A freshness-stamped result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// When the result was fetched.
    pub at: Instant,
    /// The normalized points, shared with whoever is displaying them.
    pub data: Arc<Vec<GeoPoint>>,
}

impl CacheEntry {
    pub fn new(at: Instant, data: Arc<Vec<GeoPoint>>) -> Self {
        Self { at, data }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub entry_count: usize,
}

impl CacheStats {
    /// Fraction of lookups served from cache (0.0 when nothing was looked up).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses ({:.0}% hit rate)",
            self.entry_count,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}

/// Query-result cache keyed by [`CacheKey`].
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ResultCache {
    /// Create an empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Raw entry for a key, fresh or not.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store an entry, replacing any previous one for the key.
    pub fn set(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether an entry is still within its TTL at `now`.
    pub fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.at) < self.ttl
    }

    /// Fresh data for a key, or `None` on a miss (absent or stale).
    ///
    /// Updates the hit/miss counters.
    pub fn lookup(&self, key: &CacheKey, now: Instant) -> Option<Arc<Vec<GeoPoint>>> {
        match self.get(key) {
            Some(entry) if self.is_fresh(&entry, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.data)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: self.entries.len(),
        }
    }
}
