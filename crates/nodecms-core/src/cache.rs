//! Result cache keyed by compiled statement and bound parameters.
//!
//! Entries are tagged with the entity names a statement reads. The write
//! side publishes those names after a flush and only the matching entries
//! are dropped; everything else expires by TTL.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::collaborators::CacheProvider;

/// A cached result with its expiry and invalidation topics.
#[derive(Debug)]
pub struct CachedResult {
    /// Serialized result.
    pub value: serde_json::Value,
    /// Entity names the producing statement read.
    pub topics: Vec<String>,
    expires_at: Instant,
    hit_count: AtomicU64,
}

impl CachedResult {
    fn new(value: serde_json::Value, ttl: Duration, topics: &[&str]) -> Self {
        Self {
            value,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            expires_at: Instant::now() + ttl,
            hit_count: AtomicU64::new(0),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn record_hit(&self) -> u64 {
        self.hit_count.fetch_add(1, AtomicOrdering::Relaxed) + 1
    }

    /// Number of hits served by this entry.
    pub fn hits(&self) -> u64 {
        self.hit_count.load(AtomicOrdering::Relaxed)
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(AtomicOrdering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(AtomicOrdering::Relaxed)
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(AtomicOrdering::Relaxed)
    }

    /// Hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Capacity-bounded result cache with TTL and topic invalidation.
#[derive(Debug)]
pub struct ResultCache {
    entries: DashMap<String, CachedResult>,
    capacity: usize,
    stats: CacheStats,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Evict the entry with the fewest hits.
    fn evict_least_used(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().hits())
            .map(|entry| entry.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.evictions.fetch_add(1, AtomicOrdering::Relaxed);
            trace!(key = %key, "evicted cached result");
        }
    }
}

impl CacheProvider for ResultCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => None,
            None => None,
        };
        match hit {
            Some(value) => {
                self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed);
                Some(value)
            }
            None => {
                // Expired entries are dropped on read.
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                self.stats.misses.fetch_add(1, AtomicOrdering::Relaxed);
                None
            }
        }
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration, topics: &[&str]) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(key) {
            if self.purge_expired() == 0 {
                self.evict_least_used();
            }
        }
        self.entries
            .insert(key.to_string(), CachedResult::new(value, ttl, topics));
    }

    fn invalidate(&self, topic: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.topics.iter().any(|t| t == topic));
        let dropped = before.saturating_sub(self.entries.len());
        self.stats
            .invalidations
            .fetch_add(dropped as u64, AtomicOrdering::Relaxed);
        debug!(topic, dropped, "invalidated cached results");
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_set_and_stats() {
        let cache = ResultCache::new(8);
        assert!(cache.get("a").is_none());
        cache.set("a", json!([1, 2]), Duration::from_secs(60), &["node"]);
        assert_eq!(cache.get("a"), Some(json!([1, 2])));
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalidate_only_matching_topic() {
        let cache = ResultCache::new(8);
        cache.set("nodes", json!(1), Duration::from_secs(60), &["node", "tag"]);
        cache.set("docs", json!(2), Duration::from_secs(60), &["document"]);
        assert_eq!(cache.invalidate("tag"), 1);
        assert!(cache.get("nodes").is_none());
        assert_eq!(cache.get("docs"), Some(json!(2)));
    }

    #[test]
    fn test_expiry() {
        let cache = ResultCache::new(8);
        cache.set("a", json!(1), Duration::ZERO, &["node"]);
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_used() {
        let cache = ResultCache::new(2);
        cache.set("a", json!(1), Duration::from_secs(60), &[]);
        cache.set("b", json!(2), Duration::from_secs(60), &[]);
        cache.get("a");
        cache.set("c", json!(3), Duration::from_secs(60), &[]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.stats().evictions(), 1);
    }
}
