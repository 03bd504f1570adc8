use crate::model::{CollectionNamespace, ShardId};

/// A chunk that crossed a zone boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMoveEvent {
    pub namespace: CollectionNamespace,
    pub chunk_order: usize,
    pub chunk_size: u64,
    /// Shard that gave the chunk away.
    pub source: ShardId,
    /// Shard that received it.
    pub target: ShardId,
}

/// Receives every realized chunk move of an equalizer.
pub trait ChunkMoveObserver: Send + Sync {
    fn notify(&self, event: &ChunkMoveEvent);
}
