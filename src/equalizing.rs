//! Shard-size equalization.
//!
//! Two stages: [`ZoneOptimizationSolve`] computes a target size for every
//! managed (collection, shard) bucket, then one [`ShardSizeEqualizer`] per
//! collection interval shifts zone boundaries chunk by chunk toward those
//! targets.

pub mod bucket;
pub mod chunk_collection;
pub mod descriptor;
pub mod equalizer;
pub mod observer;
pub mod quota;
pub mod simplex;
pub mod solve;
pub mod zone;

pub use bucket::{Bucket, BucketSolve};
pub use chunk_collection::{ChunkCollection, ChunkSizeResolver};
pub use descriptor::{CollectionSettings, ZoneOptimizationDescriptor};
pub use equalizer::ShardSizeEqualizer;
pub use observer::{ChunkMoveEvent, ChunkMoveObserver};
pub use quota::ShardQuotas;
pub use solve::{ActiveConstraint, ZoneOptimizationSolve};
pub use zone::{Bound, Zone};
