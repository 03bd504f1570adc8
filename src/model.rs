//! Cluster metadata model.
//!
//! Plain, immutable snapshot types describing a sharded cluster at one point
//! in time: shards and the zone tags they serve, per-collection size
//! statistics, tag ranges (zone boundaries) and chunks over the ordered
//! shard-key space.

pub mod chunk;
pub mod identity;
pub mod shard;
pub mod shard_key;
pub mod stats;
pub mod tag_range;

pub use chunk::Chunk;
pub use identity::{CollectionNamespace, ShardId, TagId};
pub use shard::Shard;
pub use shard_key::{KeyValue, ShardKey};
pub use stats::CollectionStatistics;
pub use tag_range::TagRange;
