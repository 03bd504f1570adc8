use ahash::AHashMap;
use async_trait::async_trait;

use crate::equalizing::ChunkSizeResolver;
use crate::error::{EqualizerError, Result};
use crate::model::{Chunk, CollectionNamespace, ShardId};
use crate::source::snapshot::ClusterSnapshot;

/// Chunk sizes for offline runs.
///
/// A chunk without a measured size is assumed to hold an equal share of its
/// collection's data on its shard.
#[derive(Debug, Default)]
pub struct EstimatingSizeResolver {
    shares: AHashMap<(CollectionNamespace, ShardId), (i64, u64)>,
}

impl EstimatingSizeResolver {
    pub fn new(snapshot: &ClusterSnapshot) -> Self {
        let mut shares: AHashMap<(CollectionNamespace, ShardId), (i64, u64)> = AHashMap::new();
        for (namespace, chunks) in &snapshot.chunks {
            let Some(statistics) = snapshot.statistics(namespace) else {
                continue;
            };
            for chunk in chunks {
                let entry = shares
                    .entry((namespace.clone(), chunk.shard.clone()))
                    .or_insert((statistics.size_on(&chunk.shard), 0));
                entry.1 += 1;
            }
        }
        Self { shares }
    }
}

#[async_trait]
impl ChunkSizeResolver for EstimatingSizeResolver {
    async fn resolve(&self, namespace: &CollectionNamespace, chunk: &Chunk) -> Result<u64> {
        if let Some(size) = chunk.size {
            return Ok(size);
        }
        let (size, count) = self
            .shares
            .get(&(namespace.clone(), chunk.shard.clone()))
            .copied()
            .ok_or_else(|| {
                EqualizerError::chunk_size(format!(
                    "no statistics for {namespace} on {}",
                    chunk.shard
                ))
            })?;
        Ok(size.max(0) as u64 / count.max(1))
    }
}
