//! Zone boundary records.

use serde::{Deserialize, Serialize};

use crate::error::{EqualizerError, Result};
use crate::model::identity::TagId;
use crate::model::shard_key::ShardKey;

/// A zone: the half-open shard-key interval `[min, max)` labelled with a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRange {
    pub min: ShardKey,
    pub max: ShardKey,
    pub tag: TagId,
}

impl TagRange {
    pub fn new(min: ShardKey, max: ShardKey, tag: impl Into<TagId>) -> Self {
        Self {
            min,
            max,
            tag: tag.into(),
        }
    }

    /// Whether the range lies inside the optional interval `[min, max]`.
    pub fn is_within(&self, min: Option<&ShardKey>, max: Option<&ShardKey>) -> bool {
        min.is_none_or(|m| &self.min >= m) && max.is_none_or(|m| &self.max <= m)
    }
}

/// Ranges of `ranges` lying inside the interval, ordered by `min`.
pub fn in_range(ranges: &[TagRange], min: Option<&ShardKey>, max: Option<&ShardKey>) -> Vec<TagRange> {
    let mut selected: Vec<TagRange> = ranges
        .iter()
        .filter(|r| r.is_within(min, max))
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.min.cmp(&b.min));
    selected
}

/// Verify that consecutive ranges touch: `ranges[i].max == ranges[i + 1].min`.
pub fn continuity_check(ranges: &[TagRange]) -> Result<()> {
    let Some(first) = ranges.first() else {
        return Err(EqualizerError::discontinuity("tag range list is empty"));
    };

    if first.min >= first.max {
        return Err(EqualizerError::discontinuity(format!(
            "tag range {} has empty interval {} .. {}",
            first.tag, first.min, first.max
        )));
    }

    let mut next_bound = &first.max;
    for range in &ranges[1..] {
        if &range.min != next_bound {
            return Err(EqualizerError::discontinuity(format!(
                "found discontinuity from {} to {}",
                next_bound, range.min
            )));
        }
        if range.min >= range.max {
            return Err(EqualizerError::discontinuity(format!(
                "tag range {} has empty interval {} .. {}",
                range.tag, range.min, range.max
            )));
        }
        next_bound = &range.max;
    }

    Ok(())
}
