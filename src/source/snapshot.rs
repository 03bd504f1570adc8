//! Cluster metadata saved as a JSON document.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::equalizing::ChunkSizeResolver;
use crate::error::{EqualizerError, Result};
use crate::model::chunk::from_interval;
use crate::model::tag_range::in_range;
use crate::model::{Chunk, CollectionNamespace, CollectionStatistics, Shard, ShardKey, TagRange};
use crate::source::provider::ClusterSource;
use crate::source::resolver::EstimatingSizeResolver;

/// Default cluster chunk size, 64 MB.
pub const DEFAULT_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

/// Everything the equalizer reads from a cluster.
///
/// Chunks may carry a measured `size`; the others are estimated by
/// [`EstimatingSizeResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    pub shards: Vec<Shard>,
    pub collections: Vec<CollectionStatistics>,
    #[serde(default)]
    pub tag_ranges: BTreeMap<CollectionNamespace, Vec<TagRange>>,
    #[serde(default)]
    pub chunks: BTreeMap<CollectionNamespace, Vec<Chunk>>,
}

impl Default for ClusterSnapshot {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            shards: Vec::new(),
            collections: Vec::new(),
            tag_ranges: BTreeMap::new(),
            chunks: BTreeMap::new(),
        }
    }
}

impl ClusterSnapshot {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EqualizerError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open snapshot {}: {e}", path.display()),
            ))
        })?;
        let snapshot: Self = serde_json::from_reader(BufReader::new(file))?;
        info!(
            "loaded snapshot {}: {} shards, {} collections",
            path.display(),
            snapshot.shards.len(),
            snapshot.collections.len()
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        debug!("saved snapshot to {}", path.as_ref().display());
        Ok(())
    }

    pub fn statistics(&self, namespace: &CollectionNamespace) -> Option<&CollectionStatistics> {
        self.collections.iter().find(|c| &c.namespace == namespace)
    }
}

/// [`ClusterSource`] backed by an in-memory [`ClusterSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Arc<ClusterSnapshot>,
    resolver: Arc<EstimatingSizeResolver>,
}

impl SnapshotSource {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        let snapshot = Arc::new(snapshot);
        Self {
            resolver: Arc::new(EstimatingSizeResolver::new(&snapshot)),
            snapshot,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ClusterSnapshot::load(path)?))
    }

    pub fn snapshot(&self) -> &ClusterSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl ClusterSource for SnapshotSource {
    async fn shards(&self) -> Result<Vec<Shard>> {
        Ok(self.snapshot.shards.clone())
    }

    async fn collection_statistics(
        &self,
    ) -> Result<BTreeMap<CollectionNamespace, CollectionStatistics>> {
        Ok(self
            .snapshot
            .collections
            .iter()
            .map(|c| (c.namespace.clone(), c.clone()))
            .collect())
    }

    async fn tag_ranges(
        &self,
        namespace: &CollectionNamespace,
        min: Option<&ShardKey>,
        max: Option<&ShardKey>,
    ) -> Result<Vec<TagRange>> {
        Ok(self
            .snapshot
            .tag_ranges
            .get(namespace)
            .map(|ranges| in_range(ranges, min, max))
            .unwrap_or_default())
    }

    async fn chunks(
        &self,
        namespace: &CollectionNamespace,
        min: Option<&ShardKey>,
        max: Option<&ShardKey>,
    ) -> Result<Vec<Chunk>> {
        Ok(self
            .snapshot
            .chunks
            .get(namespace)
            .map(|chunks| from_interval(chunks, min, max))
            .unwrap_or_default())
    }

    async fn chunk_size_setting(&self) -> Result<u64> {
        Ok(self.snapshot.chunk_size)
    }

    fn chunk_size_resolver(&self) -> Arc<dyn ChunkSizeResolver> {
        self.resolver.clone()
    }
}
