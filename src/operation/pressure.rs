use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::equalizing::{ChunkMoveEvent, ChunkMoveObserver};
use crate::model::ShardId;

#[derive(Debug, Default)]
struct PressureState {
    moved_chunks: usize,
    moved_size: u64,
    moved_by_shard: BTreeMap<ShardId, u64>,
    planned_by_shard: BTreeMap<ShardId, i64>,
}

/// Aggregates chunk moves of all equalizers of a run.
///
/// "Pressure" is the volume written into a shard: planned from the zones'
/// required shifts, and realized from the observed moves.
#[derive(Debug, Default)]
pub struct MovePressureTracker {
    state: Mutex<PressureState>,
}

impl MovePressureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_planned_pressure(&self, shard: &ShardId, pressure: i64) {
        *self
            .state
            .lock()
            .planned_by_shard
            .entry(shard.clone())
            .or_default() += pressure;
    }

    pub fn planned_pressure(&self) -> BTreeMap<ShardId, i64> {
        self.state.lock().planned_by_shard.clone()
    }

    pub fn total_planned_pressure(&self) -> i64 {
        self.state.lock().planned_by_shard.values().sum()
    }

    pub fn moved_chunks(&self) -> usize {
        self.state.lock().moved_chunks
    }

    pub fn moved_size(&self) -> u64 {
        self.state.lock().moved_size
    }

    /// Realized pressure per receiving shard.
    pub fn moved_by_shard(&self) -> BTreeMap<ShardId, u64> {
        self.state.lock().moved_by_shard.clone()
    }
}

impl ChunkMoveObserver for MovePressureTracker {
    fn notify(&self, event: &ChunkMoveEvent) {
        let mut state = self.state.lock();
        state.moved_chunks += 1;
        state.moved_size += event.chunk_size;
        *state
            .moved_by_shard
            .entry(event.target.clone())
            .or_default() += event.chunk_size;
    }
}
