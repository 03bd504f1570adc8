//! Per-shard move quotas shared by concurrently running equalizers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::model::ShardId;

/// Remaining volume each shard may still receive.
///
/// Shards without an entry are unlimited. Charging is a compare-and-swap
/// decrement that never goes below zero; an exhausted shard is a normal
/// state, not an error.
#[derive(Debug, Default)]
pub struct ShardQuotas {
    remaining: HashMap<ShardId, AtomicU64>,
}

impl ShardQuotas {
    /// No shard is limited.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Same `limit` for every shard in `shards`.
    pub fn uniform<'a, I>(shards: I, limit: u64) -> Self
    where
        I: IntoIterator<Item = &'a ShardId>,
    {
        shards.into_iter().map(|s| (s.clone(), limit)).collect()
    }

    pub fn set_limit(&mut self, shard: ShardId, limit: u64) {
        self.remaining.insert(shard, AtomicU64::new(limit));
    }

    /// Remaining quota, `None` when unlimited.
    pub fn remaining(&self, shard: &ShardId) -> Option<u64> {
        self.remaining
            .get(shard)
            .map(|counter| counter.load(Ordering::Acquire))
    }

    pub fn is_exhausted(&self, shard: &ShardId) -> bool {
        self.remaining(shard) == Some(0)
    }

    /// Charge `size` to `shard`. Returns false, leaving the counter as it
    /// was, when less than `size` remains.
    pub fn try_charge(&self, shard: &ShardId, size: u64) -> bool {
        let Some(counter) = self.remaining.get(shard) else {
            return true;
        };
        let charged = counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(size)
            })
            .is_ok();
        if !charged {
            debug!("quota of {shard} cannot take {size} more");
        }
        charged
    }
}

impl FromIterator<(ShardId, u64)> for ShardQuotas {
    fn from_iter<T: IntoIterator<Item = (ShardId, u64)>>(iter: T) -> Self {
        Self {
            remaining: iter
                .into_iter()
                .map(|(shard, limit)| (shard, AtomicU64::new(limit)))
                .collect(),
        }
    }
}
