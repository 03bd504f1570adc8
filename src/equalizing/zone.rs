//! Zones and the bounds between them.
//!
//! The equalizer stores both in flat vectors. Zone `i` lies between bound
//! `i` and bound `i + 1`; bound `0` and bound `n` are the fixed ends of the
//! interval. Bounds know the indices of their neighbouring zones and of the
//! chunks touching their value.

use crate::model::{ShardId, ShardKey, TagId, TagRange};

/// One tag range of the interval, bound to the shard serving its tag.
#[derive(Debug, Clone)]
pub struct Zone {
    pub(crate) tag: TagId,
    pub(crate) shard: ShardId,
    pub(crate) original: TagRange,
    pub(crate) initial_size: i64,
    pub(crate) current_size: i64,
    pub(crate) target_size: i64,
    pub(crate) left: usize,
    pub(crate) right: usize,
}

impl Zone {
    pub fn tag(&self) -> &TagId {
        &self.tag
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    /// The tag range as it was before equalizing.
    pub fn original_range(&self) -> &TagRange {
        &self.original
    }

    pub fn initial_size(&self) -> i64 {
        self.initial_size
    }

    pub fn current_size(&self) -> i64 {
        self.current_size
    }

    pub fn target_size(&self) -> i64 {
        self.target_size
    }

    /// `target_size - current_size`.
    pub fn delta(&self) -> i64 {
        self.target_size - self.current_size
    }

    pub fn left_bound(&self) -> usize {
        self.left
    }

    pub fn right_bound(&self) -> usize {
        self.right
    }
}

/// Movable boundary value between two adjacent zones.
///
/// A positive shift moves the value to the right: the left zone grows and
/// data flows from the right zone's shard into the left zone's shard.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) value: ShardKey,
    pub(crate) left_zone: Option<usize>,
    pub(crate) right_zone: Option<usize>,
    pub(crate) left_chunk: Option<usize>,
    pub(crate) right_chunk: Option<usize>,
    pub(crate) require_shift_size: i64,
    pub(crate) shift_size: i64,
    pub(crate) moved_chunks: usize,
}

impl Bound {
    pub(crate) fn new(value: ShardKey, left_zone: Option<usize>, right_zone: Option<usize>) -> Self {
        Self {
            value,
            left_zone,
            right_zone,
            left_chunk: None,
            right_chunk: None,
            require_shift_size: 0,
            shift_size: 0,
            moved_chunks: 0,
        }
    }

    pub fn value(&self) -> &ShardKey {
        &self.value
    }

    pub fn left_zone(&self) -> Option<usize> {
        self.left_zone
    }

    pub fn right_zone(&self) -> Option<usize> {
        self.right_zone
    }

    /// Chunk ending at the bound value.
    pub fn left_chunk(&self) -> Option<usize> {
        self.left_chunk
    }

    /// Chunk starting at the bound value.
    pub fn right_chunk(&self) -> Option<usize> {
        self.right_chunk
    }

    /// End bounds of the interval never move.
    pub fn is_fixed(&self) -> bool {
        self.left_zone.is_none() || self.right_zone.is_none()
    }

    /// Signed volume that should cross the bound.
    pub fn require_shift_size(&self) -> i64 {
        self.require_shift_size
    }

    /// Signed volume moved across the bound so far.
    pub fn shift_size(&self) -> i64 {
        self.shift_size
    }

    /// Volume still to move: `|require_shift_size - shift_size|`.
    pub fn elapsed_shift_size(&self) -> i64 {
        (self.require_shift_size - self.shift_size).abs()
    }

    pub fn moved_chunks(&self) -> usize {
        self.moved_chunks
    }
}
