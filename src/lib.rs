//! # Shard Equalizer
//!
//! Plans how to even out the data volume of a sharded document database by
//! moving zone (tag range) boundaries.
//!
//! ## Features
//!
//! - Linear optimization of target sizes per collection and shard
//! - Chunk-granular boundary migration under per-shard move quotas
//! - Memoized, concurrent chunk size resolution
//! - Reviewable mongo-shell command plans
//! - Offline runs against JSON cluster snapshots
//!
//! Nothing is ever applied to a cluster: the output is a script.

pub mod config;
pub mod equalizing;
mod error;
pub mod model;
pub mod operation;
pub mod plan;
pub mod source;
pub mod util;

pub use config::{CorrectionMode, EqualizerConfig, Interval, IntervalConfig, PreSplitMode};
pub use equalizing::{
    ActiveConstraint, Bound, Bucket, BucketSolve, ChunkCollection, ChunkMoveEvent,
    ChunkMoveObserver, ChunkSizeResolver, CollectionSettings, ShardQuotas, ShardSizeEqualizer,
    Zone, ZoneOptimizationDescriptor, ZoneOptimizationSolve,
};
pub use error::{EqualizerError, Result};
pub use model::{
    Chunk, CollectionNamespace, CollectionStatistics, KeyValue, Shard, ShardId, ShardKey, TagId,
    TagRange,
};
pub use operation::{
    Cancellation, DeviationOperation, DeviationReport, EqualizeOperation, EqualizeOptions,
    EqualizeReport, MovePressureTracker,
};
pub use plan::{CommandPlanSink, CommandPlanWriter, TagRangeCommandBuffer};
pub use source::{ClusterSnapshot, ClusterSource, EstimatingSizeResolver, SnapshotSource};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
