//! Time-bounded result cache.
//!
//! Identical (or near-identical) searches are coalesced onto one entry by
//! quantizing their inputs into a [`CacheKey`]. Entries carry the time they
//! were written and are considered stale after a fixed TTL.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use poimap::cache::{CacheEntry, CacheKey, ResultCache};
//!
//! let cache = Arc::new(ResultCache::new(Duration::from_secs(300)));
//! let key = CacheKey::new(center, 800.0, filters);
//!
//! if let Some(points) = cache.lookup(&key, Instant::now()) {
//!     // fresh hit, no network access
//! }
//! ```
//!
//! The cache is an ordinary value: construct one per process (or per test)
//! and share it via `Arc`.

mod key;
mod result;

pub use key::{round_coord, round_radius, CacheKey, RADIUS_BUCKET_M};
pub use result::{CacheEntry, CacheStats, ResultCache, DEFAULT_TTL};
