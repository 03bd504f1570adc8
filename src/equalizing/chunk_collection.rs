//! Ordered chunks of one collection interval with memoized sizes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::debug;
use tokio::sync::OnceCell;

use crate::error::{EqualizerError, Result};
use crate::model::{Chunk, CollectionNamespace, ShardKey};
use crate::operation::Cancellation;

/// Source of chunk data sizes for chunks without a measured size.
///
/// Implementations are usually network bound (a data-size query against the
/// owning shard).
#[async_trait]
pub trait ChunkSizeResolver: Send + Sync {
    async fn resolve(&self, namespace: &CollectionNamespace, chunk: &Chunk) -> Result<u64>;
}

/// Chunks of one collection interval, sorted by `min`.
///
/// Each chunk's size is resolved at most once; later lookups are served from
/// memory.
pub struct ChunkCollection {
    namespace: CollectionNamespace,
    chunks: Vec<Chunk>,
    sizes: Vec<OnceCell<u64>>,
    resolver: Arc<dyn ChunkSizeResolver>,
    resolved: AtomicUsize,
}

impl ChunkCollection {
    /// Build the collection, sort the chunks and assign their `order`.
    ///
    /// Fails when two chunks overlap.
    pub fn new(
        namespace: CollectionNamespace,
        mut chunks: Vec<Chunk>,
        resolver: Arc<dyn ChunkSizeResolver>,
    ) -> Result<Self> {
        chunks.sort_by(|a, b| a.min.cmp(&b.min));
        for pair in chunks.windows(2) {
            if pair[0].max > pair[1].min {
                return Err(EqualizerError::invalid_argument(format!(
                    "chunks of {namespace} overlap at {} .. {}",
                    pair[1].min, pair[0].max
                )));
            }
        }

        let sizes = chunks
            .iter_mut()
            .enumerate()
            .map(|(order, chunk)| {
                chunk.order = order;
                match chunk.size {
                    Some(size) => OnceCell::new_with(Some(size)),
                    None => OnceCell::new(),
                }
            })
            .collect();

        Ok(Self {
            namespace,
            chunks,
            sizes,
            resolver,
            resolved: AtomicUsize::new(0),
        })
    }

    pub fn namespace(&self) -> &CollectionNamespace {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, order: usize) -> Option<&Chunk> {
        self.chunks.get(order)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Chunk whose `[min, max)` contains `value`.
    pub fn find_containing(&self, value: &ShardKey) -> Option<usize> {
        let index = self.chunks.partition_point(|c| &c.min <= value);
        index
            .checked_sub(1)
            .filter(|&i| value < &self.chunks[i].max)
    }

    /// Chunk ending at or spanning `value` from the left: `min < value <= max`.
    pub fn find_left(&self, value: &ShardKey) -> Option<usize> {
        let index = self.chunks.partition_point(|c| &c.min < value);
        index
            .checked_sub(1)
            .filter(|&i| value <= &self.chunks[i].max)
    }

    /// Size of the chunk at `order`, resolving it on first use.
    pub async fn size(&self, order: usize) -> Result<u64> {
        let (chunk, cell) = match (self.chunks.get(order), self.sizes.get(order)) {
            (Some(chunk), Some(cell)) => (chunk, cell),
            _ => {
                return Err(EqualizerError::not_found(format!(
                    "chunk #{order} of {}",
                    self.namespace
                )));
            }
        };

        let size = cell
            .get_or_try_init(|| async {
                self.resolved.fetch_add(1, Ordering::Relaxed);
                self.resolver.resolve(&self.namespace, chunk).await
            })
            .await?;
        Ok(*size)
    }

    /// Size if already known, without resolving.
    pub fn cached_size(&self, order: usize) -> Option<u64> {
        self.sizes.get(order).and_then(|cell| cell.get().copied())
    }

    /// Resolve every unknown chunk size with at most `concurrency` requests
    /// in flight. Stops with [`EqualizerError::Cancelled`] when `cancel` is
    /// raised between resolutions.
    pub async fn preload(&self, concurrency: usize, cancel: &Cancellation) -> Result<()> {
        let pending: Vec<usize> = (0..self.chunks.len())
            .filter(|&i| self.sizes[i].get().is_none())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        debug!(
            "resolving {} chunk sizes of {} with concurrency {}",
            pending.len(),
            self.namespace,
            concurrency
        );

        stream::iter(pending)
            .map(|order| async move {
                if cancel.is_cancelled() {
                    return Err(EqualizerError::Cancelled);
                }
                self.size(order).await.map(|_| ())
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    /// Number of resolver calls issued so far.
    pub fn resolve_count(&self) -> usize {
        self.resolved.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ChunkCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCollection")
            .field("namespace", &self.namespace)
            .field("chunks", &self.chunks.len())
            .field("resolved", &self.resolve_count())
            .finish()
    }
}
