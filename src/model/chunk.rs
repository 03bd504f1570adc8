use serde::{Deserialize, Serialize};

use crate::model::identity::ShardId;
use crate::model::shard_key::ShardKey;

/// Minimal indivisible range `[min, max)` of a collection, owned by one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub min: ShardKey,
    pub max: ShardKey,
    pub shard: ShardId,
    /// Too large to split or move; never a migration candidate.
    #[serde(default)]
    pub jumbo: bool,
    /// Position within its collection, assigned by the chunk collection.
    #[serde(default)]
    pub order: usize,
    /// Data size when already measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Chunk {
    pub fn new(min: ShardKey, max: ShardKey, shard: impl Into<ShardId>) -> Self {
        Self {
            min,
            max,
            shard: shard.into(),
            jumbo: false,
            order: 0,
            size: None,
        }
    }

    pub fn jumbo(mut self) -> Self {
        self.jumbo = true;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn contains(&self, key: &ShardKey) -> bool {
        &self.min <= key && key < &self.max
    }

    pub fn is_within(&self, min: Option<&ShardKey>, max: Option<&ShardKey>) -> bool {
        min.is_none_or(|m| &self.min >= m) && max.is_none_or(|m| &self.max <= m)
    }
}

/// Chunks of `chunks` lying inside the interval `[min, max]`, ordered by `min`.
pub fn from_interval(chunks: &[Chunk], min: Option<&ShardKey>, max: Option<&ShardKey>) -> Vec<Chunk> {
    let mut selected: Vec<Chunk> = chunks
        .iter()
        .filter(|c| c.is_within(min, max))
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.min.cmp(&b.min));
    selected
}
