//! Bounded worker pool capping concurrent outbound I/O.
//!
//! `call`, `call_llm`, `coordinate_agents` and `rag_pipeline` are the
//! suspension points that touch the outside world; every such node
//! acquires a permit before running and the pool queues excess requests
//! rather than failing them (the engine has no "busy" error reason).

use tokio::sync::Semaphore;

/// Default capacity.
pub const DEFAULT_CAPACITY: usize = 64;

pub struct EffectWorkerPool {
    semaphore: Semaphore,
}

impl EffectWorkerPool {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "effect worker pool capacity must be positive");
        Self {
            semaphore: Semaphore::new(capacity),
        }
    }

    /// Awaits a permit, queueing the caller if the pool is at capacity.
    /// Never errors: the pool only closes if the process is shutting down,
    /// which is outside this crate's concern.
    pub async fn acquire(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.semaphore.acquire().await.expect("effect worker pool semaphore closed")
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for EffectWorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_blocks_when_pool_is_exhausted() {
        let pool = EffectWorkerPool::new(1);
        let first = pool.acquire().await;
        assert_eq!(pool.available_permits(), 0);

        let pool_ref = &pool;
        let second = tokio::time::timeout(std::time::Duration::from_millis(20), pool_ref.acquire()).await;
        assert!(second.is_err(), "second acquire should have queued, not completed");

        drop(first);
        let second = pool.acquire().await;
        assert_eq!(pool.available_permits(), 0);
        drop(second);
    }

    #[test]
    fn default_capacity_matches_spec() {
        let pool = EffectWorkerPool::default();
        assert_eq!(pool.available_permits(), DEFAULT_CAPACITY);
    }
}
