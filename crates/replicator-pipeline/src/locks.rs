use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

use replicator_core::types::{MsgId, PairId};

const SHARD_COUNT: usize = 1024;

/// Serializes edit/delete dispatch for the same `(pair_id, source_msg_id)`
/// without a single process-wide mapping mutex. Ordering across distinct
/// source messages is intentionally not guaranteed.
pub struct MappingLocks {
    shards: Vec<Mutex<()>>,
}

impl MappingLocks {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        shards.resize_with(SHARD_COUNT, || Mutex::new(()));
        Self { shards }
    }

    fn shard_index(&self, pair_id: PairId, source_msg_id: MsgId) -> usize {
        let mut hasher = DefaultHasher::new();
        pair_id.hash(&mut hasher);
        source_msg_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    pub async fn lock(&self, pair_id: PairId, source_msg_id: MsgId) -> MutexGuard<'_, ()> {
        let idx = self.shard_index(pair_id, source_msg_id);
        self.shards[idx].lock().await
    }
}

impl Default for MappingLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_serializes_through_same_shard() {
        let locks = MappingLocks::new();
        let _guard = locks.lock(PairId(1), 42).await;
        let idx_a = locks.shard_index(PairId(1), 42);
        let idx_b = locks.shard_index(PairId(1), 42);
        assert_eq!(idx_a, idx_b);
    }

    #[test]
    fn shard_count_meets_minimum() {
        let locks = MappingLocks::new();
        assert!(locks.shards.len() >= 1024);
    }
}
