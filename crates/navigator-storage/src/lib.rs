//! # navigator-storage: the hybrid storage substrate
//!
//! Three pieces composed together:
//! - [`blob`]: atomic JSON blob store, write-to-tmp-then-rename.
//! - [`event_log`]: append-only per-instance JSONL event log.
//! - [`cache`]: sharded, TTL-bearing hot cache with memory-pressure eviction.
//!
//! [`hybrid::HybridStore`] wires the cache and blob store together behind a
//! single read-through/write-through API; the event log is independent
//! since it is append-only and never cached.

pub mod blob;
pub mod cache;
pub mod event_log;
mod fnv;
pub mod hybrid;
mod sieve;

pub use blob::{BlobError, BlobRead, BlobStore};
pub use cache::{CacheKey, PutOptions, ShardedCache};
pub use event_log::{EventLog, EventLogError, ListOptions};
pub use fnv::{fnv1a, shard_for};
pub use hybrid::{CleanupReport, HybridStore};
