//! The equalize run: load metadata, solve target sizes, move zone bounds and
//! write the resulting tag range changes as a command plan.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::{CorrectionMode, Interval};
use crate::equalizing::{
    ActiveConstraint, ChunkCollection, ChunkMoveObserver, ShardQuotas, ShardSizeEqualizer,
    ZoneOptimizationDescriptor, ZoneOptimizationSolve,
};
use crate::error::{EqualizerError, Result};
use crate::model::{Chunk, CollectionNamespace, CollectionStatistics, Shard, ShardId, TagId, TagRange};
use crate::operation::cancel::Cancellation;
use crate::operation::pressure::MovePressureTracker;
use crate::plan::{CommandPlanSink, TagRangeCommandBuffer};
use crate::source::ClusterSource;
use crate::util::size::ByteSize;

/// Knobs of an equalize run.
#[derive(Debug, Clone)]
pub struct EqualizeOptions {
    /// Per-shard limit on the volume moved in; `None` is unlimited.
    pub move_limit: Option<u64>,
    /// Solve and report only, without moving any bound.
    pub plan_only: bool,
    /// Chunk size resolutions in flight.
    pub concurrency: usize,
}

impl Default for EqualizeOptions {
    fn default() -> Self {
        Self {
            move_limit: None,
            plan_only: false,
            concurrency: 8,
        }
    }
}

/// Outcome of one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalReport {
    pub namespace: CollectionNamespace,
    pub moved_size: i64,
    pub require_move_size: i64,
    pub unmoved_size: i64,
    pub moved_chunks: usize,
    pub initial_deviation: i64,
    pub current_deviation: i64,
    pub stopped_by_limit: bool,
    pub tag_ranges: Vec<TagRange>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualizeReport {
    /// Spread of the solved per-shard totals.
    pub target_max_deviation: i64,
    pub active_constraints: Vec<ActiveConstraint>,
    pub intervals: Vec<IntervalReport>,
    pub moved_chunks: usize,
}

struct EqualizeWork {
    namespace: CollectionNamespace,
    equalizer: ShardSizeEqualizer,
    initial_deviation: i64,
}

impl EqualizeWork {
    fn report(&self) -> IntervalReport {
        IntervalReport {
            namespace: self.namespace.clone(),
            moved_size: self.equalizer.moved_size(),
            require_move_size: self.equalizer.require_move_size(),
            unmoved_size: self.equalizer.elapsed_shift_size(),
            moved_chunks: self.equalizer.moved_chunks(),
            initial_deviation: self.initial_deviation,
            current_deviation: self.equalizer.current_size_deviation(),
            stopped_by_limit: self.equalizer.is_quota_blocked(),
            tag_ranges: self.equalizer.current_tag_ranges(),
        }
    }

    fn render_command_plan(&self, plan: &mut dyn CommandPlanSink) -> Result<()> {
        plan.comment(&format!("Equalize shards from {}", self.namespace))?;

        if self.equalizer.moved_size() == 0 {
            plan.comment("no correction")?;
            plan.comment("---")?;
            return plan.flush();
        }

        for zone in self.equalizer.zones() {
            info!(
                "zone {}: initial {} current {} target {}",
                zone.tag(),
                zone.initial_size().byte_size(),
                zone.current_size().byte_size(),
                zone.target_size().byte_size()
            );
        }

        plan.comment(&self.equalizer.render_state())?;
        if self.equalizer.is_quota_blocked() {
            plan.comment(&format!(
                "break by limit, unmoved {}",
                self.equalizer.elapsed_shift_size().byte_size()
            ))?;
        }
        plan.comment("change tags")?;

        let mut buffer = TagRangeCommandBuffer::new(self.namespace.clone());
        for zone in self.equalizer.zones() {
            buffer.remove_tag_range(zone.original_range().clone());
        }
        for range in self.equalizer.current_tag_ranges() {
            buffer.add_tag_range(range);
        }
        buffer.finish(plan)?;

        plan.comment("---")?;
        plan.flush()
    }
}

/// Computes and plans the zone boundary changes of all configured intervals.
pub struct EqualizeOperation {
    source: Arc<dyn ClusterSource>,
    intervals: Vec<Interval>,
    options: EqualizeOptions,
    observers: Vec<Arc<dyn ChunkMoveObserver>>,
}

impl EqualizeOperation {
    pub fn new(
        source: Arc<dyn ClusterSource>,
        intervals: Vec<Interval>,
        options: EqualizeOptions,
    ) -> Result<Self> {
        if intervals.is_empty() {
            return Err(EqualizerError::invalid_config("interval list is empty"));
        }
        let mut seen = Vec::new();
        for interval in intervals.iter().filter(|i| i.is_adjustable()) {
            if seen.contains(&&interval.namespace) {
                return Err(EqualizerError::invalid_config(format!(
                    "collection {} is adjusted by more than one interval",
                    interval.namespace
                )));
            }
            seen.push(&interval.namespace);
        }
        Ok(Self {
            source,
            intervals,
            options,
            observers: Vec::new(),
        })
    }

    /// Also report every chunk move of the run to `observer`.
    pub fn add_observer(&mut self, observer: Arc<dyn ChunkMoveObserver>) {
        self.observers.push(observer);
    }

    fn adjustable(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter().filter(|i| i.is_adjustable())
    }

    /// Run the whole pipeline, writing the plan to `plan`.
    ///
    /// When `cancel` fires while bounds are moving, the plan reflecting the
    /// moves made so far is still written and the call then fails with
    /// [`EqualizerError::Cancelled`].
    pub async fn run(
        &self,
        plan: &mut dyn CommandPlanSink,
        cancel: &Cancellation,
    ) -> Result<EqualizeReport> {
        let chunk_size = self.source.chunk_size_setting().await?;
        let statistics = self.source.collection_statistics().await?;
        let shards = self.source.shards().await?;
        let shard_by_tag = self.shard_by_tag(&shards)?;

        let mut tag_ranges = HashMap::new();
        let mut chunks = HashMap::new();
        for interval in self.adjustable() {
            let ns = &interval.namespace;
            if !statistics.contains_key(ns) {
                return Err(EqualizerError::not_found(format!("statistics of {ns}")));
            }
            let ranges = self
                .source
                .tag_ranges(ns, interval.min.as_ref(), interval.max.as_ref())
                .await?;
            if ranges.is_empty() {
                return Err(EqualizerError::not_found(format!(
                    "tag ranges of {ns} in the configured interval"
                )));
            }
            tag_ranges.insert(ns.clone(), ranges);
            let interval_chunks = self
                .source
                .chunks(ns, interval.min.as_ref(), interval.max.as_ref())
                .await?;
            chunks.insert(ns.clone(), interval_chunks);
        }
        cancel.check()?;

        let descriptor =
            self.build_descriptor(&shards, &statistics, &chunks, &shard_by_tag, chunk_size);

        info!("find solution");
        let solve = ZoneOptimizationSolve::find(&descriptor)?;
        if !solve.is_success() {
            return Err(EqualizerError::infeasible(
                "solution for zone optimization not found",
            ));
        }
        let message = format!(
            "Found solution with max deviation {} by shards",
            solve.target_shard_max_deviation().byte_size()
        );
        info!("{message}");
        plan.comment(&message)?;
        for constraint in solve.active_constraints() {
            info!(
                "active constraint: {} on {} {} {}",
                constraint.collection,
                constraint.shard,
                constraint.type_as_text(),
                constraint.bound.byte_size()
            );
        }

        let tracker = Arc::new(MovePressureTracker::new());
        let resolver = self.source.chunk_size_resolver();
        let mut works = Vec::new();
        for interval in self.adjustable() {
            let ns = &interval.namespace;
            let mut targets = HashMap::new();
            for tag in &interval.zones {
                let shard = &shard_by_tag[tag];
                let bucket = solve.get(ns, shard).ok_or_else(|| {
                    EqualizerError::internal(format!("no solved bucket for {ns} on {shard}"))
                })?;
                targets.insert(tag.clone(), bucket.target_size());
            }

            let collection = Arc::new(ChunkCollection::new(
                ns.clone(),
                chunks.remove(ns).unwrap_or_default(),
                resolver.clone(),
            )?);
            collection
                .preload(self.options.concurrency, cancel)
                .await?;

            let ranges = tag_ranges.remove(ns).unwrap_or_default();
            let mut equalizer =
                ShardSizeEqualizer::new(&shards, &statistics[ns], &ranges, &targets, collection)?;
            equalizer.add_observer(tracker.clone());
            for observer in &self.observers {
                equalizer.add_observer(observer.clone());
            }

            let work = EqualizeWork {
                namespace: ns.clone(),
                initial_deviation: equalizer.current_size_deviation(),
                equalizer,
            };
            log_shard_size_changes(&work, &tracker);
            works.push(work);
        }

        for (shard, pressure) in tracker.planned_pressure() {
            info!("total update pressure [{shard}] {}", pressure.byte_size());
        }

        if self.options.plan_only {
            for work in &works {
                plan.comment(&format!(
                    "Equalize shards from {}: {}",
                    work.namespace,
                    render_required_shifts(&work.equalizer)
                ))?;
            }
            plan.flush()?;
            return Ok(self.report(&solve, &works, &tracker));
        }

        let quotas = Arc::new(match self.options.move_limit {
            Some(limit) => ShardQuotas::uniform(shards.iter().map(|s| &s.id), limit),
            None => ShardQuotas::unlimited(),
        });
        for work in &mut works {
            work.equalizer.set_quotas(quotas.clone());
        }

        let outcome = equalize_all(&mut works, cancel).await;

        for work in &works {
            work.render_command_plan(plan)?;
        }
        plan.comment(&format!("\tMoved chunks: {}", tracker.moved_chunks()))?;
        plan.comment("\tCurrent update pressure:")?;
        for (shard, pressure) in tracker.moved_by_shard() {
            plan.comment(&format!("\t\t[{shard}] {}", pressure.byte_size()))?;
        }
        plan.flush()?;

        outcome?;
        Ok(self.report(&solve, &works, &tracker))
    }

    fn shard_by_tag(&self, shards: &[Shard]) -> Result<HashMap<TagId, ShardId>> {
        let mut map = HashMap::new();
        for tag in self.intervals.iter().flat_map(|i| i.zones.iter()) {
            if map.contains_key(tag) {
                continue;
            }
            let mut serving = shards.iter().filter(|s| s.serves(tag));
            let shard = match (serving.next(), serving.next()) {
                (Some(shard), None) => shard,
                (None, _) => {
                    return Err(EqualizerError::not_found(format!("no shard serves tag {tag}")));
                }
                (Some(_), Some(_)) => {
                    return Err(EqualizerError::invalid_config(format!(
                        "tag {tag} is served by more than one shard"
                    )));
                }
            };
            map.insert(tag.clone(), shard.id.clone());
        }
        Ok(map)
    }

    fn build_descriptor(
        &self,
        shards: &[Shard],
        statistics: &BTreeMap<CollectionNamespace, CollectionStatistics>,
        chunks: &HashMap<CollectionNamespace, Vec<Chunk>>,
        shard_by_tag: &HashMap<TagId, ShardId>,
        chunk_size: u64,
    ) -> ZoneOptimizationDescriptor {
        info!("analyse loaded data");
        let mut descriptor = ZoneOptimizationDescriptor::new(
            self.adjustable().map(|i| i.namespace.clone()),
            shards.iter().map(|s| s.id.clone()),
        );

        let mut unsharded: BTreeMap<&ShardId, i64> = BTreeMap::new();
        for stats in statistics.values().filter(|s| !s.sharded) {
            if let Some(primary) = &stats.primary {
                *unsharded.entry(primary).or_default() += stats.total_size;
            }
        }
        for (shard, size) in unsharded {
            descriptor.set_unsharded_size(shard, size);
        }

        let chunk_size = i64::try_from(chunk_size).unwrap_or(i64::MAX);
        for interval in self.adjustable() {
            let ns = &interval.namespace;
            match statistics.get(ns) {
                Some(stats) if stats.sharded => {
                    for (shard, size) in &stats.shards {
                        descriptor.bucket_mut(ns, shard).current_size = *size;
                    }
                }
                _ => warn!("{ns} is not sharded, its zones start empty"),
            }

            let settings = descriptor.settings_mut(ns);
            settings.unshard_compensation = interval.correction == CorrectionMode::UnShard;
            settings.priority = interval.priority;

            let interval_chunks = chunks.get(ns).map(Vec::as_slice).unwrap_or_default();
            for tag in &interval.zones {
                let shard = &shard_by_tag[tag];
                let movable = interval_chunks
                    .iter()
                    .filter(|c| &c.shard == shard && !c.jumbo)
                    .count()
                    .max(1);
                let bucket = descriptor.bucket_mut(ns, shard);
                bucket.managed = true;
                let locked = chunk_size.saturating_mul(movable as i64 - 1);
                let current = bucket.current_size;
                bucket.set_min_size(current.saturating_sub(locked));
            }
        }

        for bucket in descriptor
            .managed_buckets()
            .filter(|b| b.min_size() == b.current_size)
        {
            info!(
                "lock reduction of size: {} on {} ({})",
                bucket.collection(),
                bucket.shard(),
                bucket.current_size.byte_size()
            );
        }
        debug!("zone optimization input: {}", descriptor.to_json());
        descriptor
    }

    fn report(
        &self,
        solve: &ZoneOptimizationSolve,
        works: &[EqualizeWork],
        tracker: &MovePressureTracker,
    ) -> EqualizeReport {
        EqualizeReport {
            target_max_deviation: solve.target_shard_max_deviation(),
            active_constraints: solve.active_constraints().to_vec(),
            intervals: works.iter().map(EqualizeWork::report).collect(),
            moved_chunks: tracker.moved_chunks(),
        }
    }
}

/// Keep moving the equalizer with the most volume left until none moves.
async fn equalize_all(works: &mut [EqualizeWork], cancel: &Cancellation) -> Result<()> {
    let mut in_progress: Vec<usize> = (0..works.len()).collect();
    while !in_progress.is_empty() {
        cancel.check()?;

        let Some(position) = (0..in_progress.len())
            .max_by_key(|&p| works[in_progress[p]].equalizer.elapsed_shift_size())
        else {
            break;
        };
        let work = &mut works[in_progress[position]];
        debug!("equalize {}", work.namespace);

        if !work.equalizer.equalize().await? {
            info!(
                "equalize {} completed (unmoved data size {})",
                work.namespace,
                work.equalizer.elapsed_shift_size().byte_size()
            );
            info!("{}", work.equalizer.render_state());
            in_progress.remove(position);
        }
    }
    Ok(())
}

fn log_shard_size_changes(work: &EqualizeWork, tracker: &MovePressureTracker) {
    info!("equalize shards from {}", work.namespace);
    let equalizer = &work.equalizer;
    let mut order: Vec<usize> = (0..equalizer.zones().len()).collect();
    order.sort_by(|&a, &b| equalizer.zones()[a].shard().cmp(equalizer.zones()[b].shard()));
    for index in order {
        let zone = &equalizer.zones()[index];
        let pressure = equalizer.zone_pressure(index);
        tracker.add_planned_pressure(zone.shard(), pressure);
        info!(
            "[{}] {} -> {} delta: {} pressure: {}",
            zone.shard(),
            zone.initial_size().byte_size(),
            zone.target_size().byte_size(),
            zone.delta().byte_size(),
            pressure.byte_size()
        );
    }
    info!("bound changes: {}", render_required_shifts(equalizer));
}

/// `[a] <- 100 B <- [b] -- [c]` style line of the required bound shifts.
/// Arrows point the way data has to flow, as in
/// [`ShardSizeEqualizer::render_state`]; `--` marks a bound that stays.
fn render_required_shifts(equalizer: &ShardSizeEqualizer) -> String {
    let zones = equalizer.zones();
    let mut line = String::new();
    for (index, zone) in zones.iter().enumerate() {
        if index > 0 {
            let shift = equalizer.bounds()[zone.left_bound()].require_shift_size();
            let symbol = match shift {
                0 => "--",
                s if s > 0 => "<-",
                _ => "->",
            };
            line.push_str(&format!(" {symbol} {} {symbol} ", shift.unsigned_abs().byte_size()));
        }
        line.push_str(&format!("[{}]", zone.tag()));
    }
    line
}
