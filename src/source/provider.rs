use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::equalizing::ChunkSizeResolver;
use crate::error::Result;
use crate::model::{Chunk, CollectionNamespace, CollectionStatistics, Shard, ShardKey, TagRange};

/// Point-in-time view of a sharded cluster's metadata.
///
/// Interval filters are inclusive on both ends: an item is returned when
/// `item.min >= min` and `item.max <= max`; `None` leaves that end open.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Shards and the zone tags they serve.
    async fn shards(&self) -> Result<Vec<Shard>>;

    /// Size statistics of every collection.
    async fn collection_statistics(
        &self,
    ) -> Result<BTreeMap<CollectionNamespace, CollectionStatistics>>;

    /// Tag ranges of `namespace` inside the interval, sorted by `min`.
    async fn tag_ranges(
        &self,
        namespace: &CollectionNamespace,
        min: Option<&ShardKey>,
        max: Option<&ShardKey>,
    ) -> Result<Vec<TagRange>>;

    /// Chunks of `namespace` inside the interval, sorted by `min`.
    async fn chunks(
        &self,
        namespace: &CollectionNamespace,
        min: Option<&ShardKey>,
        max: Option<&ShardKey>,
    ) -> Result<Vec<Chunk>>;

    /// Cluster-wide maximum chunk size in bytes.
    async fn chunk_size_setting(&self) -> Result<u64>;

    /// Resolver for chunks whose size is not part of the metadata.
    fn chunk_size_resolver(&self) -> Arc<dyn ChunkSizeResolver>;
}
