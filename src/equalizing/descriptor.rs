//! Input of the zone optimization: every bucket of every managed collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::equalizing::bucket::Bucket;
use crate::error::{EqualizerError, Result};
use crate::model::{CollectionNamespace, ShardId};

/// Per-collection correction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSettings {
    /// Weight of the collection's own balance in the objective.
    pub priority: f64,
    /// Let the collection counterbalance the shards' un-sharded data.
    pub unshard_compensation: bool,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            priority: 1.0,
            unshard_compensation: false,
        }
    }
}

/// The complete variable space handed to [`ZoneOptimizationSolve::find`].
///
/// Built once per run. Buckets are created on first access and stay
/// unmanaged until explicitly marked.
///
/// [`ZoneOptimizationSolve::find`]: crate::equalizing::solve::ZoneOptimizationSolve::find
#[derive(Debug, Clone, Default)]
pub struct ZoneOptimizationDescriptor {
    collections: Vec<CollectionNamespace>,
    shards: Vec<ShardId>,
    buckets: BTreeMap<(CollectionNamespace, ShardId), Bucket>,
    unsharded_size: BTreeMap<ShardId, i64>,
    settings: BTreeMap<CollectionNamespace, CollectionSettings>,
}

impl ZoneOptimizationDescriptor {
    /// Create a descriptor with one (unmanaged, empty) bucket per
    /// collection and shard.
    pub fn new<C, S>(collections: C, shards: S) -> Self
    where
        C: IntoIterator<Item = CollectionNamespace>,
        S: IntoIterator<Item = ShardId>,
    {
        let mut descriptor = Self::default();
        let shards: Vec<ShardId> = shards.into_iter().collect();
        for collection in collections {
            for shard in &shards {
                descriptor.bucket_mut(&collection, shard);
            }
        }
        for shard in shards {
            descriptor.register_shard(&shard);
        }
        descriptor
    }

    fn register_shard(&mut self, shard: &ShardId) {
        if !self.shards.contains(shard) {
            self.shards.push(shard.clone());
        }
    }

    fn register_collection(&mut self, collection: &CollectionNamespace) {
        if !self.collections.contains(collection) {
            self.collections.push(collection.clone());
        }
    }

    pub fn collections(&self) -> &[CollectionNamespace] {
        &self.collections
    }

    pub fn shards(&self) -> &[ShardId] {
        &self.shards
    }

    /// Get or create the bucket of `(collection, shard)`.
    pub fn bucket_mut(&mut self, collection: &CollectionNamespace, shard: &ShardId) -> &mut Bucket {
        self.register_collection(collection);
        self.register_shard(shard);
        self.buckets
            .entry((collection.clone(), shard.clone()))
            .or_insert_with(|| Bucket::new(collection.clone(), shard.clone()))
    }

    pub fn bucket(&self, collection: &CollectionNamespace, shard: &ShardId) -> Option<&Bucket> {
        self.buckets.get(&(collection.clone(), shard.clone()))
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn managed_buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values().filter(|b| b.managed)
    }

    /// Buckets of one collection, in shard order.
    pub fn collection_buckets<'a>(
        &'a self,
        collection: &'a CollectionNamespace,
    ) -> impl Iterator<Item = &'a Bucket> + 'a {
        self.buckets
            .values()
            .filter(move |b| b.collection() == collection)
    }

    /// Aggregate size of un-sharded collections living on `shard`.
    pub fn unsharded_size(&self, shard: &ShardId) -> i64 {
        self.unsharded_size.get(shard).copied().unwrap_or(0)
    }

    pub fn set_unsharded_size(&mut self, shard: &ShardId, size: i64) {
        self.register_shard(shard);
        self.unsharded_size.insert(shard.clone(), size);
    }

    /// Get or create the settings of `collection`.
    pub fn settings_mut(&mut self, collection: &CollectionNamespace) -> &mut CollectionSettings {
        self.register_collection(collection);
        self.settings.entry(collection.clone()).or_default()
    }

    pub fn settings(&self, collection: &CollectionNamespace) -> CollectionSettings {
        self.settings.get(collection).cloned().unwrap_or_default()
    }

    /// Check the input is well formed: non-negative sizes and positive
    /// priorities. Floors above current sizes are left to the solver, which
    /// reports them as infeasible.
    pub fn validate(&self) -> Result<()> {
        for bucket in self.buckets.values() {
            if bucket.current_size < 0 {
                return Err(EqualizerError::invalid_argument(format!(
                    "bucket {} on {} has negative size {}",
                    bucket.collection(),
                    bucket.shard(),
                    bucket.current_size
                )));
            }
        }
        for (shard, size) in &self.unsharded_size {
            if *size < 0 {
                return Err(EqualizerError::invalid_argument(format!(
                    "un-sharded size of {shard} is negative"
                )));
            }
        }
        for (collection, settings) in &self.settings {
            if !(settings.priority.is_finite() && settings.priority > 0.0) {
                return Err(EqualizerError::invalid_argument(format!(
                    "priority of {collection} must be positive, got {}",
                    settings.priority
                )));
            }
        }
        Ok(())
    }

    /// Dump the descriptor as JSON for diagnostics.
    pub fn to_json(&self) -> serde_json::Value {
        let buckets: Vec<serde_json::Value> = self
            .buckets
            .values()
            .map(|b| {
                json!({
                    "collection": b.collection(),
                    "shard": b.shard(),
                    "currentSize": b.current_size,
                    "minSize": b.min_size(),
                    "managed": b.managed,
                })
            })
            .collect();
        json!({
            "collections": self.collections,
            "shards": self.shards,
            "unShardedSize": self.unsharded_size,
            "settings": self.settings,
            "buckets": buckets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> CollectionNamespace {
        CollectionNamespace::new("db", name)
    }

    #[test]
    fn test_get_or_create_unmanaged() {
        let mut d = ZoneOptimizationDescriptor::new([ns("a")], [ShardId::new("s1")]);
        assert_eq!(d.buckets().count(), 1);
        assert!(!d.bucket(&ns("a"), &ShardId::new("s1")).unwrap().managed);

        d.bucket_mut(&ns("b"), &ShardId::new("s2")).current_size = 10;
        assert_eq!(d.collections().len(), 2);
        assert_eq!(d.shards().len(), 2);
        assert_eq!(d.managed_buckets().count(), 0);
    }

    #[test]
    fn test_settings_default() {
        let mut d = ZoneOptimizationDescriptor::default();
        assert_eq!(d.settings(&ns("a")).priority, 1.0);
        d.settings_mut(&ns("a")).unshard_compensation = true;
        assert!(d.settings(&ns("a")).unshard_compensation);
    }

    #[test]
    fn test_validate() {
        let mut d = ZoneOptimizationDescriptor::default();
        d.bucket_mut(&ns("a"), &ShardId::new("s1")).current_size = -1;
        assert!(d.validate().is_err());

        let mut d = ZoneOptimizationDescriptor::default();
        d.settings_mut(&ns("a")).priority = 0.0;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_json_dump() {
        let mut d = ZoneOptimizationDescriptor::default();
        d.set_unsharded_size(&ShardId::new("s1"), 5);
        let bucket = d.bucket_mut(&ns("a"), &ShardId::new("s1"));
        bucket.current_size = 7;
        bucket.managed = true;
        let dump = d.to_json();
        assert_eq!(dump["buckets"][0]["currentSize"], 7);
        assert_eq!(dump["unShardedSize"]["s1"], 5);
    }
}
