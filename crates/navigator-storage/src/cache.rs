//! Sharded, TTL-bearing hot cache over the blob store.
//!
//! Entries are keyed by `(table_id, key)` and sharded by FNV-1a hash of that
//! pair so that, like the instance registry, each shard has a single writer
//! at a time and no global lock is ever taken.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::fnv::shard_for;
use crate::sieve::SieveCache;

/// Default sweep interval for expired-entry collection.
pub const DEFAULT_SWEEP_SECS: i64 = 30;
/// Default entry TTL when a caller does not specify one.
pub const DEFAULT_TTL_SECS: i64 = 3600;
/// Default memory-pressure threshold before emergency cleanup runs.
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub table_id: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(table_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            key: key.into(),
        }
    }

    fn shard_key(&self) -> String {
        format!("{}\0{}", self.table_id, self.key)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
    inserted_at: DateTime<Utc>,
    dirty: bool,
    estimated_bytes: usize,
}

/// Options for [`ShardedCache::put`].
#[derive(Debug, Clone, Copy)]
pub struct PutOptions {
    pub ttl: Duration,
    pub persist_immediately: bool,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            persist_immediately: false,
        }
    }
}

struct Shard<V> {
    sieve: SieveCache<CacheKey, CacheEntry<V>>,
}

/// A sharded cache with TTL-based lazy eviction and memory-pressure cleanup.
///
/// `N` shards, matching the instance registry's shard count.
pub struct ShardedCache<V: Clone> {
    shards: Vec<Mutex<Shard<V>>>,
    shard_count: usize,
}

impl<V: Clone> ShardedCache<V> {
    pub fn new(shard_count: usize, per_shard_capacity: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be > 0");
        let shards = (0..shard_count)
            .map(|_| {
                Mutex::new(Shard {
                    sieve: SieveCache::new(per_shard_capacity),
                })
            })
            .collect();
        Self {
            shards,
            shard_count,
        }
    }

    fn shard_index(&self, key: &CacheKey) -> usize {
        shard_for(&key.shard_key(), self.shard_count)
    }

    /// Returns the cached value for `key` if present and unexpired, marking
    /// it visited. Expired entries are lazily evicted on access.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<V> {
        let mut shard = self.shards[self.shard_index(key)].lock().expect("shard lock poisoned");
        let expired = shard.sieve.peek(key).is_some_and(|entry| entry.expires_at <= now);
        if expired {
            shard.sieve.remove(key);
            return None;
        }
        shard.sieve.get(key).map(|entry| entry.value.clone())
    }

    /// Inserts `value`, refreshing its expiry.
    pub fn put(&self, key: CacheKey, value: V, opts: PutOptions, now: DateTime<Utc>, estimated_bytes: usize) {
        let mut shard = self.shards[self.shard_index(&key)].lock().expect("shard lock poisoned");
        shard.sieve.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + opts.ttl,
                inserted_at: now,
                dirty: !opts.persist_immediately,
                estimated_bytes,
            },
        );
    }

    /// Marks a previously `put` entry as persisted (no longer dirty).
    pub fn mark_clean(&self, key: &CacheKey) {
        let mut shard = self.shards[self.shard_index(key)].lock().expect("shard lock poisoned");
        if let Some(entry) = shard.sieve.get_mut(key) {
            entry.dirty = false;
        }
    }

    /// Removes `key` from the cache.
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        let mut shard = self.shards[self.shard_index(key)].lock().expect("shard lock poisoned");
        shard.sieve.remove(key).map(|entry| entry.value)
    }

    /// Drops every expired entry across all shards.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().expect("shard lock poisoned");
            let expired: Vec<CacheKey> = shard
                .sieve
                .keys()
                .filter(|key| {
                    shard
                        .sieve
                        .peek(key)
                        .is_some_and(|entry| entry.expires_at <= now)
                })
                .cloned()
                .collect();
            for key in expired {
                shard.sieve.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// Dirty entries across all shards, for the caller to persist (step 1
    /// of memory-pressure cleanup).
    pub fn dirty_entries(&self) -> Vec<(CacheKey, V)> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().expect("shard lock poisoned");
            for key in shard.sieve.keys() {
                if let Some(entry) = shard.sieve.peek(key) {
                    if entry.dirty {
                        out.push((key.clone(), entry.value.clone()));
                    }
                }
            }
        }
        out
    }

    /// Total estimated bytes resident across all shards.
    pub fn estimated_bytes(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let shard = shard.lock().expect("shard lock poisoned");
                shard
                    .sieve
                    .keys()
                    .filter_map(|key| shard.sieve.peek(key).map(|e| e.estimated_bytes))
                    .sum::<usize>()
            })
            .sum()
    }

    /// Evicts oldest-inserted entries per shard until total estimated bytes
    /// is at or below `target_bytes` (step 3, "emergency cleanup").
    pub fn evict_oldest_until(&self, target_bytes: usize) -> usize {
        let mut evicted = 0;
        while self.estimated_bytes() > target_bytes {
            let mut evicted_any = false;
            for shard in &self.shards {
                let mut shard = shard.lock().expect("shard lock poisoned");
                if self.estimated_bytes_locked(&shard) <= target_bytes / self.shard_count.max(1) {
                    continue;
                }
                let oldest = shard
                    .sieve
                    .keys()
                    .min_by_key(|key| {
                        shard
                            .sieve
                            .peek(key)
                            .map(|entry| entry.inserted_at)
                            .unwrap_or(DateTime::<Utc>::MIN_UTC)
                    })
                    .cloned();
                if let Some(key) = oldest {
                    shard.sieve.remove(&key);
                    evicted += 1;
                    evicted_any = true;
                }
            }
            if !evicted_any {
                break;
            }
        }
        evicted
    }

    fn estimated_bytes_locked(&self, shard: &Shard<V>) -> usize {
        shard
            .sieve
            .keys()
            .filter_map(|key| shard.sieve.peek(key).map(|e| e.estimated_bytes))
            .sum()
    }
}

/// Computes the 50%-of-threshold floor used by emergency cleanup.
pub fn emergency_floor(threshold_bytes: usize) -> usize {
    threshold_bytes / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_returns_value() {
        let cache: ShardedCache<String> = ShardedCache::new(4, 8);
        let now = Utc::now();
        let key = CacheKey::new("workflows", "inst-1");
        cache.put(key.clone(), "latched".to_string(), PutOptions::default(), now, 16);

        assert_eq!(cache.get(&key, now), Some("latched".to_string()));
    }

    #[test]
    fn expired_entry_is_lazily_evicted_on_access() {
        let cache: ShardedCache<String> = ShardedCache::new(4, 8);
        let now = Utc::now();
        let key = CacheKey::new("workflows", "inst-1");
        let opts = PutOptions {
            ttl: Duration::seconds(1),
            persist_immediately: false,
        };
        cache.put(key.clone(), "latched".to_string(), opts, now, 16);

        let later = now + Duration::seconds(5);
        assert_eq!(cache.get(&key, later), None);
    }

    #[test]
    fn remove_drops_entry() {
        let cache: ShardedCache<String> = ShardedCache::new(4, 8);
        let now = Utc::now();
        let key = CacheKey::new("workflows", "inst-1");
        cache.put(key.clone(), "latched".to_string(), PutOptions::default(), now, 16);
        cache.remove(&key);
        assert_eq!(cache.get(&key, now), None);
    }

    #[test]
    fn sweep_expired_removes_only_expired_entries() {
        let cache: ShardedCache<String> = ShardedCache::new(4, 8);
        let now = Utc::now();
        let expired_key = CacheKey::new("workflows", "old");
        let fresh_key = CacheKey::new("workflows", "fresh");
        cache.put(
            expired_key.clone(),
            "x".to_string(),
            PutOptions {
                ttl: Duration::seconds(1),
                persist_immediately: false,
            },
            now,
            16,
        );
        cache.put(
            fresh_key.clone(),
            "y".to_string(),
            PutOptions {
                ttl: Duration::days(1),
                persist_immediately: false,
            },
            now,
            16,
        );

        let later = now + Duration::seconds(5);
        let removed = cache.sweep_expired(later);
        assert_eq!(removed, 1);
        assert_eq!(cache.get(&fresh_key, later), Some("y".to_string()));
    }

    #[test]
    fn dirty_entries_tracks_unpersisted_writes_and_mark_clean_clears_them() {
        let cache: ShardedCache<String> = ShardedCache::new(4, 8);
        let now = Utc::now();
        let key = CacheKey::new("workflows", "inst-1");
        cache.put(key.clone(), "latched".to_string(), PutOptions::default(), now, 16);

        assert_eq!(cache.dirty_entries().len(), 1);
        cache.mark_clean(&key);
        assert!(cache.dirty_entries().is_empty());
    }

    #[test]
    fn persist_immediately_is_not_dirty() {
        let cache: ShardedCache<String> = ShardedCache::new(4, 8);
        let now = Utc::now();
        let key = CacheKey::new("workflows", "inst-1");
        let opts = PutOptions {
            ttl: Duration::seconds(30),
            persist_immediately: true,
        };
        cache.put(key, "latched".to_string(), opts, now, 16);
        assert!(cache.dirty_entries().is_empty());
    }

    #[test]
    fn evict_oldest_until_reduces_below_target() {
        let cache: ShardedCache<String> = ShardedCache::new(1, 8);
        let now = Utc::now();
        for i in 0..5 {
            let key = CacheKey::new("workflows", format!("inst-{i}"));
            cache.put(
                key,
                "x".repeat(100),
                PutOptions::default(),
                now + Duration::seconds(i),
                100,
            );
        }
        assert!(cache.estimated_bytes() >= 500);
        cache.evict_oldest_until(200);
        assert!(cache.estimated_bytes() <= 200);
    }

    #[test]
    fn emergency_floor_is_half_of_threshold() {
        assert_eq!(emergency_floor(DEFAULT_MEMORY_THRESHOLD_BYTES), 128 * 1024 * 1024);
    }
}
