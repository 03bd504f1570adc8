use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::identity::{CollectionNamespace, ShardId};

/// Size statistics of one collection.
///
/// For a sharded collection `shards` breaks the data size down per shard.
/// An un-sharded collection lives entirely on its `primary` shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatistics {
    pub namespace: CollectionNamespace,
    pub total_size: i64,
    #[serde(default)]
    pub sharded: bool,
    #[serde(default)]
    pub primary: Option<ShardId>,
    #[serde(default)]
    pub shards: BTreeMap<ShardId, i64>,
}

impl CollectionStatistics {
    pub fn sharded<I>(namespace: CollectionNamespace, shards: I) -> Self
    where
        I: IntoIterator<Item = (ShardId, i64)>,
    {
        let shards: BTreeMap<ShardId, i64> = shards.into_iter().collect();
        Self {
            namespace,
            total_size: shards.values().sum(),
            sharded: true,
            primary: None,
            shards,
        }
    }

    pub fn unsharded(namespace: CollectionNamespace, primary: ShardId, size: i64) -> Self {
        Self {
            namespace,
            total_size: size,
            sharded: false,
            primary: Some(primary),
            shards: BTreeMap::new(),
        }
    }

    /// Size of the collection held by `shard`, zero when absent.
    pub fn size_on(&self, shard: &ShardId) -> i64 {
        self.shards.get(shard).copied().unwrap_or(0)
    }
}
