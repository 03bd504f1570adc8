//! Chunk-granular zone boundary migration for one collection interval.
//!
//! The equalizer holds the zones of one interval as an ordered chain. Every
//! interior bound knows how much volume should cross it to reach the target
//! sizes; each [`ShardSizeEqualizer::equalize`] call moves one bound across
//! one whole chunk. Callers loop until `equalize` returns `false`.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

use log::{debug, info};

use crate::equalizing::chunk_collection::ChunkCollection;
use crate::equalizing::observer::{ChunkMoveEvent, ChunkMoveObserver};
use crate::equalizing::quota::ShardQuotas;
use crate::equalizing::zone::{Bound, Zone};
use crate::error::{EqualizerError, Result};
use crate::model::tag_range::continuity_check;
use crate::model::{CollectionNamespace, CollectionStatistics, Shard, ShardId, TagId, TagRange};
use crate::util::size::ByteSize;

pub struct ShardSizeEqualizer {
    namespace: CollectionNamespace,
    zones: Vec<Zone>,
    bounds: Vec<Bound>,
    chunks: Arc<ChunkCollection>,
    quotas: Option<Arc<ShardQuotas>>,
    observers: Vec<Arc<dyn ChunkMoveObserver>>,
    quota_blocked: bool,
}

impl ShardSizeEqualizer {
    /// Build the zone chain of one interval.
    ///
    /// `tag_ranges` must be sorted and contiguous. Each zone starts with the
    /// collection's size on the shard serving its tag; `target_sizes` gives
    /// the size each tag should end up with.
    pub fn new(
        shards: &[Shard],
        statistics: &CollectionStatistics,
        tag_ranges: &[TagRange],
        target_sizes: &HashMap<TagId, i64>,
        chunks: Arc<ChunkCollection>,
    ) -> Result<Self> {
        continuity_check(tag_ranges)?;
        let namespace = chunks.namespace().clone();

        let mut zones = Vec::with_capacity(tag_ranges.len());
        let mut seen_shards = HashSet::new();
        for (index, range) in tag_ranges.iter().enumerate() {
            let shard = shard_of(shards, &range.tag)?;
            if !seen_shards.insert(shard.clone()) {
                return Err(EqualizerError::invalid_argument(format!(
                    "shard {shard} serves more than one zone of {namespace}"
                )));
            }
            let target_size = target_sizes.get(&range.tag).copied().ok_or_else(|| {
                EqualizerError::not_found(format!("target size of zone {}", range.tag))
            })?;
            let current_size = statistics.size_on(&shard);
            zones.push(Zone {
                tag: range.tag.clone(),
                shard,
                original: range.clone(),
                initial_size: current_size,
                current_size,
                target_size,
                left: index,
                right: index + 1,
            });
        }

        let count = zones.len();
        let mut bounds = Vec::with_capacity(count + 1);
        bounds.push(Bound::new(tag_ranges[0].min.clone(), None, Some(0)));
        for (index, range) in tag_ranges.iter().enumerate() {
            let right_zone = (index + 1 < count).then_some(index + 1);
            bounds.push(Bound::new(range.max.clone(), Some(index), right_zone));
        }

        let first = &mut bounds[0];
        first.right_chunk = chunks.find_containing(&first.value);
        if first.right_chunk.is_none() {
            return Err(EqualizerError::missing_chunk(format!(
                "no chunk of {namespace} starts the interval at {}",
                first.value
            )));
        }
        let last = &mut bounds[count];
        last.left_chunk = chunks.find_left(&last.value);
        if last.left_chunk.is_none() {
            return Err(EqualizerError::missing_chunk(format!(
                "no chunk of {namespace} ends the interval at {}",
                last.value
            )));
        }

        let mut require = 0;
        for index in 1..count {
            let zone = &zones[index - 1];
            require += zone.target_size - zone.current_size;
            let bound = &mut bounds[index];
            bound.require_shift_size = require;
            bound.left_chunk = chunks.find_left(&bound.value);
            bound.right_chunk = chunks.find_containing(&bound.value);
        }

        Ok(Self {
            namespace,
            zones,
            bounds,
            chunks,
            quotas: None,
            observers: Vec::new(),
            quota_blocked: false,
        })
    }

    pub fn namespace(&self) -> &CollectionNamespace {
        &self.namespace
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// All bounds including the two fixed ends.
    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn chunks(&self) -> &Arc<ChunkCollection> {
        &self.chunks
    }

    fn interior_bounds(&self) -> impl Iterator<Item = &Bound> {
        self.bounds.iter().filter(|b| !b.is_fixed())
    }

    /// `max - min` of the zones' current sizes.
    pub fn current_size_deviation(&self) -> i64 {
        let max = self.zones.iter().map(|z| z.current_size).max();
        let min = self.zones.iter().map(|z| z.current_size).min();
        match (max, min) {
            (Some(max), Some(min)) => max - min,
            _ => 0,
        }
    }

    /// Volume actually moved across all bounds.
    pub fn moved_size(&self) -> i64 {
        self.interior_bounds().map(|b| b.shift_size.abs()).sum()
    }

    /// Volume that would move if every zone reached its target exactly.
    pub fn require_move_size(&self) -> i64 {
        self.interior_bounds()
            .map(|b| b.require_shift_size.abs())
            .sum()
    }

    /// Volume still to move across all bounds.
    pub fn elapsed_shift_size(&self) -> i64 {
        self.interior_bounds().map(|b| b.elapsed_shift_size()).sum()
    }

    pub fn moved_chunks(&self) -> usize {
        self.bounds.iter().map(|b| b.moved_chunks).sum()
    }

    /// A move was refused because the destination's quota ran out.
    pub fn is_quota_blocked(&self) -> bool {
        self.quota_blocked
    }

    /// Volume the bounds of zone `index` are meant to bring into it, not
    /// netted against what it gives away.
    pub fn zone_pressure(&self, index: usize) -> i64 {
        let zone = &self.zones[index];
        let from_left = -self.bounds[zone.left].require_shift_size;
        let from_right = self.bounds[zone.right].require_shift_size;
        from_left.max(0) + from_right.max(0)
    }

    /// Current tag range of zone `index`.
    pub fn zone_range(&self, index: usize) -> TagRange {
        let zone = &self.zones[index];
        TagRange::new(
            self.bounds[zone.left].value.clone(),
            self.bounds[zone.right].value.clone(),
            zone.tag.clone(),
        )
    }

    /// Tag ranges after equalizing, in interval order.
    pub fn current_tag_ranges(&self) -> Vec<TagRange> {
        (0..self.zones.len()).map(|i| self.zone_range(i)).collect()
    }

    pub fn set_quotas(&mut self, quotas: Arc<ShardQuotas>) {
        self.quotas = Some(quotas);
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ChunkMoveObserver>) {
        self.observers.push(observer);
    }

    /// Move at most one chunk, preferring the bound with the most volume
    /// still to move. Returns `false` once no bound can move.
    pub async fn equalize(&mut self) -> Result<bool> {
        let mut order: Vec<usize> = (0..self.bounds.len())
            .filter(|&i| !self.bounds[i].is_fixed())
            .collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.bounds[i].elapsed_shift_size()));

        for index in order {
            if self.try_move(index).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn try_move(&mut self, index: usize) -> Result<bool> {
        let bound = &self.bounds[index];
        let (Some(left_zone), Some(right_zone)) = (bound.left_zone, bound.right_zone) else {
            return Ok(false);
        };
        let remaining = bound.require_shift_size - bound.shift_size;
        if remaining == 0 {
            return Ok(false);
        }

        let moving_right = remaining > 0;
        let (candidate, source, target) = if moving_right {
            (bound.right_chunk, right_zone, left_zone)
        } else {
            (bound.left_chunk, left_zone, right_zone)
        };
        let Some(order) = candidate else {
            return Ok(false);
        };
        let Some(chunk) = self.chunks.get(order) else {
            return Ok(false);
        };
        if chunk.jumbo {
            debug!("{}: jumbo chunk #{order} blocks bound {}", self.namespace, bound.value);
            return Ok(false);
        }

        // The chunk must end strictly inside the source zone.
        let source_zone = &self.zones[source];
        let leaves_zone_non_empty = if moving_right {
            chunk.max < self.bounds[source_zone.right].value
        } else {
            chunk.min > self.bounds[source_zone.left].value
        };
        if !leaves_zone_non_empty {
            return Ok(false);
        }

        let size = self.chunks.size(order).await?;
        let signed = i64::try_from(size)
            .map_err(|_| EqualizerError::chunk_size(format!("chunk #{order} size {size} overflows")))?;
        if signed >= 2 * remaining.abs() {
            return Ok(false);
        }

        let deviation = self.current_size_deviation();
        let deviation_after = self.deviation_after_move(source, target, signed);
        if deviation_after > deviation {
            debug!(
                "{}: chunk #{order} across {} would raise deviation {} -> {}",
                self.namespace,
                self.bounds[index].value,
                deviation.byte_size(),
                deviation_after.byte_size()
            );
            return Ok(false);
        }

        let target_shard = self.zones[target].shard.clone();
        if let Some(quotas) = &self.quotas
            && !quotas.try_charge(&target_shard, size)
        {
            if !self.quota_blocked {
                info!("{}: move quota of {target_shard} exhausted", self.namespace);
            }
            self.quota_blocked = true;
            return Ok(false);
        }

        let new_value = if moving_right {
            chunk.max.clone()
        } else {
            chunk.min.clone()
        };
        let bound = &mut self.bounds[index];
        bound.value = new_value;
        bound.shift_size += if moving_right { signed } else { -signed };
        bound.moved_chunks += 1;
        bound.left_chunk = self.chunks.find_left(&bound.value);
        bound.right_chunk = self.chunks.find_containing(&bound.value);

        self.zones[source].current_size -= signed;
        self.zones[target].current_size += signed;

        let event = ChunkMoveEvent {
            namespace: self.namespace.clone(),
            chunk_order: order,
            chunk_size: size,
            source: self.zones[source].shard.clone(),
            target: target_shard,
        };
        debug!(
            "{}: chunk #{} ({}) {} -> {}",
            self.namespace,
            order,
            size.byte_size(),
            event.source,
            event.target
        );
        for observer in &self.observers {
            observer.notify(&event);
        }
        Ok(true)
    }

    /// Max - min zone size if `size` moved from zone `source` to zone `target`.
    fn deviation_after_move(&self, source: usize, target: usize, size: i64) -> i64 {
        let sizes = self.zones.iter().enumerate().map(|(i, zone)| match i {
            i if i == source => zone.current_size - size,
            i if i == target => zone.current_size + size,
            _ => zone.current_size,
        });
        let (min, max) = sizes.fold((i64::MAX, i64::MIN), |(min, max), s| {
            (min.min(s), max.max(s))
        });
        if min > max { 0 } else { max - min }
    }

    /// One line describing every zone and the shift of every bound, e.g.
    /// `[a] -> 80 B (2) -> [b] | [c]`.
    ///
    /// Arrows point the way data flowed across a bound, from the zone that
    /// shrank to the zone that grew, so `->` means the bound itself moved
    /// left. The number in parentheses is how many chunks crossed the bound.
    /// `|` marks a bound that has not moved.
    pub fn render_state(&self) -> String {
        let mut line = String::new();
        for (index, zone) in self.zones.iter().enumerate() {
            let _ = write!(line, "[{}]", zone.tag);
            if index + 1 == self.zones.len() {
                break;
            }
            let bound = &self.bounds[zone.right];
            let _ = match bound.shift_size {
                0 => write!(line, " | "),
                shift if shift < 0 => write!(
                    line,
                    " -> {} ({}) -> ",
                    shift.unsigned_abs().byte_size(),
                    bound.moved_chunks
                ),
                shift => write!(
                    line,
                    " <- {} ({}) <- ",
                    shift.byte_size(),
                    bound.moved_chunks
                ),
            };
        }
        line
    }
}

impl std::fmt::Debug for ShardSizeEqualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardSizeEqualizer")
            .field("namespace", &self.namespace)
            .field("zones", &self.zones)
            .field("bounds", &self.bounds)
            .finish()
    }
}

fn shard_of(shards: &[Shard], tag: &TagId) -> Result<ShardId> {
    let mut serving = shards.iter().filter(|s| s.serves(tag));
    match (serving.next(), serving.next()) {
        (Some(shard), None) => Ok(shard.id.clone()),
        (None, _) => Err(EqualizerError::not_found(format!("no shard serves tag {tag}"))),
        (Some(_), Some(_)) => Err(EqualizerError::invalid_argument(format!(
            "tag {tag} is served by more than one shard"
        ))),
    }
}
