//! Single-writer-per-shard serialization.
//!
//! The registry's actual instance data lives in a [`navigator_storage::HybridStore`]
//! (hot cache + durable blob, already internally sharded). This module only
//! owns the *write* lock: one `tokio::sync::Mutex` per shard, selected by
//! `fnv1a(tenant_id) mod N`, so concurrent writers touching different
//! tenants never block each other while writers touching the same tenant
//! are serialized.

use navigator_storage::shard_for;
use navigator_types::TenantId;
use tokio::sync::{Mutex, MutexGuard};

pub struct ShardLocks {
    locks: Vec<Mutex<()>>,
}

impl ShardLocks {
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be > 0");
        Self {
            locks: (0..shard_count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.locks.len()
    }

    pub fn index_for(&self, tenant_id: &TenantId) -> usize {
        shard_for(tenant_id.as_str(), self.locks.len())
    }

    pub async fn lock(&self, index: usize) -> MutexGuard<'_, ()> {
        self.locks[index].lock().await
    }
}
