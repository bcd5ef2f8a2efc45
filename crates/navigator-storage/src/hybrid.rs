//! The hybrid storage substrate: cache + blob store wired together with
//! write-through consistency between the two.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::blob::{BlobError, BlobRead, BlobStore};
use crate::cache::{emergency_floor, CacheKey, PutOptions, ShardedCache};

/// Ties the [`BlobStore`] (durable) and [`ShardedCache`] (hot, in-process)
/// together behind read-through/write-through semantics.
pub struct HybridStore<V: Clone> {
    blobs: BlobStore,
    cache: ShardedCache<V>,
    memory_threshold_bytes: usize,
}

/// What a [`HybridStore::memory_pressure_cleanup`] pass did.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
    pub persisted: usize,
    pub expired_dropped: usize,
    pub emergency_evicted: usize,
}

impl<V: Clone + Serialize + DeserializeOwned> HybridStore<V> {
    pub fn new(
        root: impl Into<std::path::PathBuf>,
        shard_count: usize,
        per_shard_capacity: usize,
        memory_threshold_bytes: usize,
    ) -> Self {
        Self {
            blobs: BlobStore::new(root),
            cache: ShardedCache::new(shard_count, per_shard_capacity),
            memory_threshold_bytes,
        }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Read-through: serves from cache on hit; on miss, loads from the blob
    /// store and populates the cache with a fresh TTL.
    pub fn get(
        &self,
        path: &std::path::Path,
        key: CacheKey,
        now: DateTime<Utc>,
        estimated_bytes: usize,
    ) -> Result<Option<V>, BlobError> {
        if let Some(value) = self.cache.get(&key, now) {
            return Ok(Some(value));
        }
        match self.blobs.read::<V>(path)? {
            BlobRead::Ok(value) => {
                self.cache.put(
                    key,
                    value.clone(),
                    PutOptions {
                        persist_immediately: true,
                        ..PutOptions::default()
                    },
                    now,
                    estimated_bytes,
                );
                Ok(Some(value))
            }
            BlobRead::NotFound => Ok(None),
        }
    }

    /// Write-through: always inserts into the cache; persists synchronously
    /// when `opts.persist_immediately`, otherwise leaves the entry dirty for
    /// a later [`Self::memory_pressure_cleanup`] or explicit flush.
    pub fn put(
        &self,
        path: &std::path::Path,
        key: CacheKey,
        value: V,
        opts: PutOptions,
        now: DateTime<Utc>,
        estimated_bytes: usize,
    ) -> Result<(), BlobError> {
        let persist_immediately = opts.persist_immediately;
        self.cache.put(key.clone(), value.clone(), opts, now, estimated_bytes);
        if persist_immediately {
            self.blobs.write(path, &value)?;
            self.cache.mark_clean(&key);
        }
        Ok(())
    }

    /// Removes an entry from both cache and blob store.
    pub fn delete(&self, path: &std::path::Path, key: &CacheKey) -> Result<(), BlobError> {
        self.cache.remove(key);
        self.blobs.delete(path)
    }

    /// Drops expired entries across all shards.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        self.cache.sweep_expired(now)
    }

    /// Runs memory-pressure cleanup (flush dirty entries, then evict) when
    /// estimated resident bytes exceed the configured threshold. `path_for`
    /// maps a dirty entry's key back to its blob path for persistence.
    pub fn memory_pressure_cleanup(
        &self,
        now: DateTime<Utc>,
        path_for: impl Fn(&CacheKey) -> std::path::PathBuf,
    ) -> Result<CleanupReport, BlobError> {
        if self.cache.estimated_bytes() <= self.memory_threshold_bytes {
            return Ok(CleanupReport::default());
        }

        let mut report = CleanupReport::default();

        for (key, value) in self.cache.dirty_entries() {
            let path = path_for(&key);
            self.blobs.write(&path, &value)?;
            self.cache.mark_clean(&key);
            report.persisted += 1;
        }

        report.expired_dropped = self.cache.sweep_expired(now);

        if self.cache.estimated_bytes() > self.memory_threshold_bytes {
            let floor = emergency_floor(self.memory_threshold_bytes);
            report.emergency_evicted = self.cache.evict_oldest_until(floor);
        }

        Ok(report)
    }
}
