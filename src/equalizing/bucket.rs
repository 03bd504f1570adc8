use serde::{Deserialize, Serialize};

use crate::model::{CollectionNamespace, ShardId};

/// Accounting slot for how much of one collection sits on one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    collection: CollectionNamespace,
    shard: ShardId,
    /// Observed data size.
    pub current_size: i64,
    /// Participates in the optimization.
    pub managed: bool,
    min_size: i64,
}

impl Bucket {
    pub fn new(collection: CollectionNamespace, shard: ShardId) -> Self {
        Self {
            collection,
            shard,
            current_size: 0,
            managed: false,
            min_size: 0,
        }
    }

    pub fn collection(&self) -> &CollectionNamespace {
        &self.collection
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    /// Floor the target size may not go below.
    pub fn min_size(&self) -> i64 {
        self.min_size
    }

    /// Set the floor; negative values are clamped to zero.
    pub fn set_min_size(&mut self, value: i64) {
        self.min_size = value.max(0);
    }

    /// The bucket cannot give away any data.
    pub fn is_locked(&self) -> bool {
        self.min_size >= self.current_size
    }
}

/// The optimizer's view of a [`Bucket`] with its computed target size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSolve {
    collection: CollectionNamespace,
    shard: ShardId,
    current_size: i64,
    min_size: i64,
    managed: bool,
    target_size: i64,
    delta: i64,
    variable_index: Option<usize>,
}

impl BucketSolve {
    pub fn new(source: &Bucket) -> Self {
        Self {
            collection: source.collection.clone(),
            shard: source.shard.clone(),
            current_size: source.current_size,
            min_size: source.min_size,
            managed: source.managed,
            target_size: source.current_size,
            delta: 0,
            variable_index: None,
        }
    }

    pub fn collection(&self) -> &CollectionNamespace {
        &self.collection
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    pub fn current_size(&self) -> i64 {
        self.current_size
    }

    pub fn min_size(&self) -> i64 {
        self.min_size
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    pub fn target_size(&self) -> i64 {
        self.target_size
    }

    /// Set the target size; also recomputes [`delta`](Self::delta).
    pub fn set_target_size(&mut self, value: i64) {
        self.target_size = value;
        self.delta = value - self.current_size;
    }

    /// `target_size - current_size`.
    pub fn delta(&self) -> i64 {
        self.delta
    }

    /// Column of the optimizer variable bound to this bucket.
    pub fn variable_index(&self) -> Option<usize> {
        self.variable_index
    }

    pub(crate) fn bind_variable(&mut self, index: usize) {
        self.variable_index = Some(index);
    }

    /// Size reached after moving `percent` (0.0..=1.0) of the way to the target.
    pub fn partial_target_size(&self, percent: f64) -> i64 {
        self.current_size + (percent * self.delta as f64).round() as i64
    }
}
