//! # Prefetch Cache
//!
//! Records staged ahead of demand because they are strongly linked to
//! something that was just read. An entry is served at most once: `take`
//! removes it, so of two concurrent readers exactly one gets it.
//!
//! Unbounded by default. With a capacity the oldest staged entry is evicted
//! to make room; the bound is approximate under concurrent staging. With a
//! TTL, entries staged longer ago than the TTL are dropped instead of served.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use vdatabprot_core::config::CacheConfig;
use vdatabprot_core::types::{VectorId, VectorRecord};

struct StagedRecord {
    record: VectorRecord,
    staged_at: Instant,
}

pub struct PrefetchCache {
    entries: DashMap<VectorId, StagedRecord>,
    capacity: Option<usize>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    staged: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub staged: u64,
    pub evicted: u64,
    pub expired: u64,
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

impl Default for PrefetchCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl PrefetchCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: config.capacity,
            ttl: config.ttl(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            staged: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Stage `record` under `id`, replacing anything already staged there
    pub fn stage(&self, id: VectorId, record: VectorRecord) {
        if let Some(capacity) = self.capacity {
            while !self.entries.contains_key(&id) && self.entries.len() >= capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }

        trace!(%id, "Staging prefetched record");
        self.entries.insert(
            id,
            StagedRecord {
                record,
                staged_at: Instant::now(),
            },
        );
        self.staged.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove and return the staged record for `id`
    pub fn take(&self, id: &VectorId) -> Option<VectorRecord> {
        match self.entries.remove(id) {
            Some((_, staged)) if self.is_expired(&staged) => {
                trace!(%id, "Discarding expired prefetch");
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some((_, staged)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(staged.record)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Drop whatever is staged for `id`. Not counted as a hit or a miss.
    pub fn invalidate(&self, id: &VectorId) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            trace!(%id, "Invalidated staged record");
        }
        removed
    }

    pub fn contains(&self, id: &VectorId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            staged: self.staged.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, staged: &StagedRecord) -> bool {
        self.ttl
            .map(|ttl| staged.staged_at.elapsed() > ttl)
            .unwrap_or(false)
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().staged_at)
            .map(|entry| entry.key().clone());

        match oldest {
            Some(id) => {
                if self.entries.remove(&id).is_some() {
                    trace!(%id, "Evicted staged record");
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use vdatabprot_core::VectorCodec;

    fn record(data: &[u8]) -> VectorRecord {
        VectorCodec::default().encode(data).unwrap()
    }

    #[test]
    fn test_take_consumes() {
        let cache = PrefetchCache::default();
        let id = VectorId::from("b");
        cache.stage(id.clone(), record(b"B"));

        assert!(cache.contains(&id));
        assert_eq!(cache.take(&id), Some(record(b"B")));
        assert!(!cache.contains(&id));
        assert_eq!(cache.take(&id), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_restage_overwrites() {
        let cache = PrefetchCache::default();
        let id = VectorId::from("b");
        cache.stage(id.clone(), record(b"old"));
        cache.stage(id.clone(), record(b"new"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take(&id), Some(record(b"new")));
    }

    #[test]
    fn test_invalidate_is_not_a_lookup() {
        let cache = PrefetchCache::default();
        let id = VectorId::from("b");
        cache.stage(id.clone(), record(b"B"));

        assert!(cache.invalidate(&id));
        assert!(!cache.invalidate(&id));
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.staged, 1);
    }

    #[test]
    fn test_unbounded_by_default() {
        let cache = PrefetchCache::default();
        for i in 0..2_000 {
            cache.stage(VectorId::from(format!("v{}", i)), record(b"x"));
        }
        assert_eq!(cache.len(), 2_000);
        assert_eq!(cache.stats().evicted, 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = PrefetchCache::new(&CacheConfig {
            capacity: Some(2),
            ttl_ms: None,
        });
        cache.stage(VectorId::from("first"), record(b"1"));
        thread::sleep(Duration::from_millis(2));
        cache.stage(VectorId::from("second"), record(b"2"));
        thread::sleep(Duration::from_millis(2));
        cache.stage(VectorId::from("third"), record(b"3"));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&VectorId::from("first")));
        assert!(cache.contains(&VectorId::from("second")));
        assert!(cache.contains(&VectorId::from("third")));
        assert_eq!(cache.stats().evicted, 1);
    }

    #[test]
    fn test_ttl_expires_entries() {
        let cache = PrefetchCache::new(&CacheConfig {
            capacity: None,
            ttl_ms: Some(20),
        });
        let id = VectorId::from("b");
        cache.stage(id.clone(), record(b"B"));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.take(&id), None);
        assert!(!cache.contains(&id));
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_concurrent_take_single_winner() {
        for _ in 0..20 {
            let cache = Arc::new(PrefetchCache::default());
            let id = VectorId::from("contended");
            cache.stage(id.clone(), record(b"once"));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let id = id.clone();
                    thread::spawn(move || cache.take(&id).is_some())
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }
}
