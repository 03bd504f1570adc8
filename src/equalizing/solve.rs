//! Target sizes for every managed bucket.
//!
//! The descriptor is turned into a linear program over one variable per
//! managed bucket: `y = target - min_size`, so the floor becomes the
//! non-negativity of `y`. Every collection conserves its managed volume.
//!
//! The objective is
//!
//! ```text
//! minimize  D_total + λ · Σ_c priority_c · D_c
//! ```
//!
//! where `D_total` is the spread (max − min) of the per-shard totals of
//! collections compensating un-sharded data (un-sharded size + their
//! targets + their unmanaged sizes) and `D_c` is the spread of collection
//! `c`'s own managed targets. Collections without compensation only
//! balance themselves; among compensating collections the priority decides
//! which ones stay closest to their own balance while the others absorb
//! the compensation.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use log::{debug, warn};

use crate::equalizing::bucket::BucketSolve;
use crate::equalizing::descriptor::ZoneOptimizationDescriptor;
use crate::equalizing::simplex::{LinearProgram, LpOutcome, Relation};
use crate::error::{EqualizerError, Result};
use crate::model::{CollectionNamespace, ShardId};

/// Weight of the per-collection spreads relative to the cluster spread.
const COLLECTION_SPREAD_WEIGHT: f64 = 0.01;

/// A bucket whose floor is binding at the optimum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConstraint {
    pub collection: CollectionNamespace,
    pub shard: ShardId,
    /// The floor (`min_size`) the target sits on.
    pub bound: i64,
}

impl ActiveConstraint {
    pub fn type_as_text(&self) -> &'static str {
        ">="
    }
}

impl fmt::Display for ActiveConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} {} {}",
            self.collection,
            self.shard,
            self.type_as_text(),
            self.bound
        )
    }
}

/// Result of solving a [`ZoneOptimizationDescriptor`].
#[derive(Debug, Clone)]
pub struct ZoneOptimizationSolve {
    success: bool,
    target_shard_max_deviation: i64,
    buckets: BTreeMap<(CollectionNamespace, ShardId), BucketSolve>,
    active_constraints: Vec<ActiveConstraint>,
    target_shard_totals: BTreeMap<ShardId, i64>,
}

impl ZoneOptimizationSolve {
    /// Solve the descriptor.
    ///
    /// Malformed input (negative sizes, non-positive priorities) is an
    /// error. An infeasible model, e.g. floors summing above a collection's
    /// size, is a successful call returning `is_success() == false`.
    pub fn find(descriptor: &ZoneOptimizationDescriptor) -> Result<Self> {
        descriptor.validate()?;

        let mut buckets: BTreeMap<(CollectionNamespace, ShardId), BucketSolve> = descriptor
            .buckets()
            .map(|b| ((b.collection().clone(), b.shard().clone()), BucketSolve::new(b)))
            .collect();

        let managed: Vec<(CollectionNamespace, ShardId)> = buckets
            .iter()
            .filter(|(_, b)| b.is_managed())
            .map(|(k, _)| k.clone())
            .collect();

        if managed.is_empty() {
            return Ok(Self::assemble(descriptor, true, buckets, Vec::new()));
        }

        let unit = descriptor
            .buckets()
            .map(|b| b.current_size)
            .chain(descriptor.shards().iter().map(|s| descriptor.unsharded_size(s)))
            .max()
            .unwrap_or(1)
            .max(1) as f64;

        let mut lp = LinearProgram::new();
        for key in &managed {
            let variable = lp.add_variable(0.0);
            if let Some(bucket) = buckets.get_mut(key) {
                bucket.bind_variable(variable);
            }
        }

        let mut managed_by_collection: BTreeMap<&CollectionNamespace, Vec<&BucketSolve>> =
            BTreeMap::new();
        for key in &managed {
            if let Some(bucket) = buckets.get(key) {
                managed_by_collection
                    .entry(bucket.collection())
                    .or_default()
                    .push(bucket);
            }
        }

        // Conservation of each collection's managed volume.
        for (collection, members) in &managed_by_collection {
            let current: i64 = members.iter().map(|b| b.current_size()).sum();
            let floors: i64 = members.iter().map(|b| b.min_size()).sum();
            if floors > current {
                warn!(
                    "floors of {collection} sum to {floors}, above its managed size {current}"
                );
            }
            let coefficients = members
                .iter()
                .filter_map(|b| b.variable_index())
                .map(|v| (v, 1.0))
                .collect();
            lp.add_constraint(
                coefficients,
                Relation::Equal,
                (current - floors) as f64 / unit,
            );
        }

        // Spread of each collection's own targets.
        for (collection, members) in &managed_by_collection {
            if members.len() < 2 {
                continue;
            }
            let weight = COLLECTION_SPREAD_WEIGHT * descriptor.settings(collection).priority;
            let upper = lp.add_variable(weight);
            let lower = lp.add_variable(-weight);
            for bucket in members {
                let Some(v) = bucket.variable_index() else {
                    continue;
                };
                let floor = bucket.min_size() as f64 / unit;
                lp.add_constraint(vec![(upper, 1.0), (v, -1.0)], Relation::GreaterEq, floor);
                lp.add_constraint(vec![(lower, 1.0), (v, -1.0)], Relation::LessEq, floor);
            }
        }

        // Spread of the shard totals carried by compensating collections.
        let compensating: Vec<&CollectionNamespace> = managed_by_collection
            .keys()
            .copied()
            .filter(|c| descriptor.settings(c).unshard_compensation)
            .collect();
        if !compensating.is_empty() {
            let mut per_shard: BTreeMap<&ShardId, (f64, Vec<(usize, f64)>)> = BTreeMap::new();
            for bucket in buckets.values() {
                if !compensating.contains(&bucket.collection()) || !bucket.is_managed() {
                    continue;
                }
                per_shard.insert(bucket.shard(), (0.0, Vec::new()));
            }
            for (shard, (fixed, terms)) in per_shard.iter_mut() {
                *fixed += descriptor.unsharded_size(shard) as f64 / unit;
                for collection in &compensating {
                    let Some(bucket) = buckets.get(&((*collection).clone(), (*shard).clone()))
                    else {
                        continue;
                    };
                    match bucket.variable_index() {
                        Some(v) => {
                            *fixed += bucket.min_size() as f64 / unit;
                            terms.push((v, -1.0));
                        }
                        None => *fixed += bucket.current_size() as f64 / unit,
                    }
                }
            }

            let upper = lp.add_variable(1.0);
            let lower = lp.add_variable(-1.0);
            for (fixed, terms) in per_shard.values() {
                let mut above = terms.clone();
                above.push((upper, 1.0));
                lp.add_constraint(above, Relation::GreaterEq, *fixed);
                let mut below = terms.clone();
                below.push((lower, 1.0));
                lp.add_constraint(below, Relation::LessEq, *fixed);
            }
        }

        debug!(
            "zone optimization: {} managed buckets, {} variables, {} compensating collections",
            managed.len(),
            lp.variable_count(),
            compensating.len()
        );

        let values = match lp.solve() {
            LpOutcome::Optimal { values, objective } => {
                debug!("zone optimization objective {objective:.6}");
                values
            }
            LpOutcome::Infeasible => {
                return Ok(Self::assemble(descriptor, false, buckets, Vec::new()));
            }
            LpOutcome::Unbounded => {
                return Err(EqualizerError::internal("zone optimization is unbounded"));
            }
            LpOutcome::IterationLimit => {
                return Err(EqualizerError::internal(
                    "zone optimization exceeded the iteration limit",
                ));
            }
        };

        for (collection, keys) in group_keys(&managed) {
            round_conserving(&collection, &keys, &mut buckets, &values, unit);
        }

        let active_constraints = managed
            .iter()
            .filter_map(|key| buckets.get(key))
            .filter(|b| b.target_size() == b.min_size())
            .map(|b| ActiveConstraint {
                collection: b.collection().clone(),
                shard: b.shard().clone(),
                bound: b.min_size(),
            })
            .collect();

        Ok(Self::assemble(descriptor, true, buckets, active_constraints))
    }

    fn assemble(
        descriptor: &ZoneOptimizationDescriptor,
        success: bool,
        buckets: BTreeMap<(CollectionNamespace, ShardId), BucketSolve>,
        active_constraints: Vec<ActiveConstraint>,
    ) -> Self {
        let mut target_shard_totals: BTreeMap<ShardId, i64> = BTreeMap::new();
        for bucket in buckets.values().filter(|b| b.is_managed()) {
            target_shard_totals
                .entry(bucket.shard().clone())
                .or_insert_with(|| descriptor.unsharded_size(bucket.shard()));
        }
        for bucket in buckets.values() {
            if let Some(total) = target_shard_totals.get_mut(bucket.shard()) {
                *total += bucket.target_size();
            }
        }

        let target_shard_max_deviation = match (
            target_shard_totals.values().max(),
            target_shard_totals.values().min(),
        ) {
            (Some(max), Some(min)) if success => max - min,
            _ => 0,
        };

        Self {
            success,
            target_shard_max_deviation,
            buckets,
            active_constraints,
            target_shard_totals,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Spread of the resulting per-shard totals over shards hosting
    /// managed buckets.
    pub fn target_shard_max_deviation(&self) -> i64 {
        self.target_shard_max_deviation
    }

    pub fn get(&self, collection: &CollectionNamespace, shard: &ShardId) -> Option<&BucketSolve> {
        self.buckets.get(&(collection.clone(), shard.clone()))
    }

    pub fn buckets(&self) -> impl Iterator<Item = &BucketSolve> {
        self.buckets.values()
    }

    /// Buckets whose floor is binding at the optimum.
    pub fn active_constraints(&self) -> &[ActiveConstraint] {
        &self.active_constraints
    }

    /// Per-shard totals after applying the targets.
    pub fn target_shard_totals(&self) -> &BTreeMap<ShardId, i64> {
        &self.target_shard_totals
    }
}

impl Index<(&CollectionNamespace, &ShardId)> for ZoneOptimizationSolve {
    type Output = BucketSolve;

    /// Solved bucket of `collection` on `shard`.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor had no such bucket. Use
    /// [`ZoneOptimizationSolve::get`] when the key may be missing.
    fn index(&self, (collection, shard): (&CollectionNamespace, &ShardId)) -> &BucketSolve {
        match self.get(collection, shard) {
            Some(bucket) => bucket,
            None => panic!("no bucket for {collection} on {shard}"),
        }
    }
}

fn group_keys(
    keys: &[(CollectionNamespace, ShardId)],
) -> BTreeMap<CollectionNamespace, Vec<(CollectionNamespace, ShardId)>> {
    let mut groups: BTreeMap<CollectionNamespace, Vec<(CollectionNamespace, ShardId)>> =
        BTreeMap::new();
    for key in keys {
        groups.entry(key.0.clone()).or_default().push(key.clone());
    }
    groups
}

/// Round the continuous targets of one collection to whole bytes while
/// keeping the collection's managed volume exact and every target on or
/// above its floor.
fn round_conserving(
    collection: &CollectionNamespace,
    keys: &[(CollectionNamespace, ShardId)],
    buckets: &mut BTreeMap<(CollectionNamespace, ShardId), BucketSolve>,
    values: &[f64],
    unit: f64,
) {
    let mut current_total = 0i64;
    let mut target_total = 0i64;
    for key in keys {
        let Some(bucket) = buckets.get_mut(key) else {
            continue;
        };
        let y = bucket.variable_index().map(|v| values[v]).unwrap_or(0.0);
        let target = bucket.min_size() + (y * unit).round() as i64;
        bucket.set_target_size(target.max(bucket.min_size()));
        current_total += bucket.current_size();
        target_total += bucket.target_size();
    }

    let mut residual = current_total - target_total;
    if residual == 0 {
        return;
    }
    debug!("rounding residual {residual} for {collection}");

    // Hand the residual to the buckets with the most room above their floor.
    let mut order: Vec<&(CollectionNamespace, ShardId)> = keys.iter().collect();
    order.sort_by_key(|key| {
        buckets
            .get(*key)
            .map(|b| std::cmp::Reverse(b.target_size() - b.min_size()))
    });
    for key in order {
        if residual == 0 {
            break;
        }
        let Some(bucket) = buckets.get_mut(key) else {
            continue;
        };
        let adjustment = if residual > 0 {
            residual
        } else {
            residual.max(bucket.min_size() - bucket.target_size())
        };
        bucket.set_target_size(bucket.target_size() + adjustment);
        residual -= adjustment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(name: &str) -> CollectionNamespace {
        CollectionNamespace::new("db", name)
    }

    fn shard(name: &str) -> ShardId {
        ShardId::new(name)
    }

    #[test]
    fn test_without_managed_buckets_targets_equal_current() {
        let mut d = ZoneOptimizationDescriptor::default();
        d.bucket_mut(&ns("a"), &shard("s1")).current_size = 40;
        let solve = ZoneOptimizationSolve::find(&d).unwrap();
        assert!(solve.is_success());
        assert_eq!(solve[(&ns("a"), &shard("s1"))].target_size(), 40);
        assert!(solve.active_constraints().is_empty());
    }

    #[test]
    #[should_panic(expected = "no bucket for db.b on s1")]
    fn test_index_of_missing_bucket_panics() {
        let mut d = ZoneOptimizationDescriptor::default();
        d.bucket_mut(&ns("a"), &shard("s1")).current_size = 40;
        let solve = ZoneOptimizationSolve::find(&d).unwrap();
        assert!(solve.get(&ns("b"), &shard("s1")).is_none());
        let _ = solve[(&ns("b"), &shard("s1"))].target_size();
    }

    #[test]
    fn test_rounding_conserves_odd_totals() {
        let mut d = ZoneOptimizationDescriptor::default();
        for (s, size) in [("s1", 100), ("s2", 0), ("s3", 0)] {
            let b = d.bucket_mut(&ns("a"), &shard(s));
            b.current_size = size;
            b.managed = true;
        }
        let solve = ZoneOptimizationSolve::find(&d).unwrap();
        assert!(solve.is_success());
        let total: i64 = solve.buckets().map(|b| b.target_size()).sum();
        assert_eq!(total, 100);
        for b in solve.buckets() {
            assert!((33..=34).contains(&b.target_size()), "{b:?}");
        }
    }

    #[test]
    fn test_variables_bound_to_managed_only() {
        let mut d = ZoneOptimizationDescriptor::default();
        let b = d.bucket_mut(&ns("a"), &shard("s1"));
        b.current_size = 10;
        b.managed = true;
        d.bucket_mut(&ns("a"), &shard("s2")).current_size = 10;
        let solve = ZoneOptimizationSolve::find(&d).unwrap();
        assert!(solve[(&ns("a"), &shard("s1"))].variable_index().is_some());
        assert!(solve[(&ns("a"), &shard("s2"))].variable_index().is_none());
    }
}
