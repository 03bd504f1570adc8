use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use shard_equalizer::{
    Cancellation, Chunk, ChunkCollection, ChunkSizeResolver, CollectionNamespace, EqualizerError,
    KeyValue, Result, ShardKey,
};

fn key(n: i64) -> ShardKey {
    ShardKey::single("_id", KeyValue::Number(n))
}

fn ns() -> CollectionNamespace {
    CollectionNamespace::new("db", "events")
}

/// Answers `min + 1` after yielding, and records the peak number of
/// requests in flight.
#[derive(Default)]
struct SlowResolver {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ChunkSizeResolver for SlowResolver {
    async fn resolve(&self, _namespace: &CollectionNamespace, chunk: &Chunk) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &chunk.min.fields()[0].1 {
            KeyValue::Number(n) => Ok(*n as u64 + 1),
            other => Err(EqualizerError::chunk_size(format!("unexpected key {other}"))),
        }
    }
}

struct FailingResolver;

#[async_trait]
impl ChunkSizeResolver for FailingResolver {
    async fn resolve(&self, namespace: &CollectionNamespace, chunk: &Chunk) -> Result<u64> {
        Err(EqualizerError::chunk_size(format!(
            "datasize failed for {namespace} {}",
            chunk.min
        )))
    }
}

/// Twenty chunks of ten keys each; every fourth one carries a measured size.
fn chunks() -> Vec<Chunk> {
    (0..20)
        .rev()
        .map(|i| {
            let chunk = Chunk::new(key(i * 10), key(i * 10 + 10), "s1");
            if i % 4 == 0 { chunk.with_size(1000) } else { chunk }
        })
        .collect()
}

#[test]
fn test_chunks_sorted_and_ordered() -> Result<()> {
    let collection = ChunkCollection::new(ns(), chunks(), Arc::new(FailingResolver))?;
    assert_eq!(collection.len(), 20);
    for (order, chunk) in collection.iter().enumerate() {
        assert_eq!(chunk.order, order);
        assert_eq!(chunk.min, key(order as i64 * 10));
    }
    Ok(())
}

#[test]
fn test_overlapping_chunks_rejected() {
    let chunks = vec![
        Chunk::new(key(0), key(20), "s1"),
        Chunk::new(key(10), key(30), "s1"),
    ];
    let result = ChunkCollection::new(ns(), chunks, Arc::new(FailingResolver));
    assert!(matches!(result, Err(EqualizerError::InvalidArgument(_))));
}

#[test]
fn test_lookup_at_boundaries() -> Result<()> {
    let collection = ChunkCollection::new(ns(), chunks(), Arc::new(FailingResolver))?;

    assert_eq!(collection.find_containing(&key(0)), Some(0));
    assert_eq!(collection.find_containing(&key(10)), Some(1));
    assert_eq!(collection.find_containing(&key(15)), Some(1));
    assert_eq!(collection.find_containing(&key(200)), None);
    assert_eq!(collection.find_containing(&key(-1)), None);

    assert_eq!(collection.find_left(&key(10)), Some(0));
    assert_eq!(collection.find_left(&key(15)), Some(1));
    assert_eq!(collection.find_left(&key(200)), Some(19));
    assert_eq!(collection.find_left(&key(0)), None);
    Ok(())
}

#[tokio::test]
async fn test_preload_bounded_and_memoized() -> Result<()> {
    let resolver = Arc::new(SlowResolver::default());
    let collection = ChunkCollection::new(ns(), chunks(), resolver.clone())?;

    assert_eq!(collection.cached_size(0), Some(1000));
    assert_eq!(collection.cached_size(1), None);

    collection.preload(3, &Cancellation::new()).await?;
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 15);
    assert_eq!(collection.resolve_count(), 15);
    assert!(resolver.peak.load(Ordering::SeqCst) <= 3);

    assert_eq!(collection.size(0).await?, 1000);
    assert_eq!(collection.size(1).await?, 11);
    assert_eq!(collection.size(19).await?, 191);

    // A second preload has nothing left to resolve.
    collection.preload(3, &Cancellation::new()).await?;
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 15);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_lookups_resolve_once() -> Result<()> {
    let resolver = Arc::new(SlowResolver::default());
    let collection = ChunkCollection::new(ns(), chunks(), resolver.clone())?;

    let (a, b, c) = tokio::join!(collection.size(5), collection.size(5), collection.size(5));
    assert_eq!((a?, b?, c?), (51, 51, 51));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_preload_stops() -> Result<()> {
    let resolver = Arc::new(SlowResolver::default());
    let collection = ChunkCollection::new(ns(), chunks(), resolver.clone())?;
    let cancel = Cancellation::new();
    cancel.cancel();

    let result = collection.preload(4, &cancel).await;
    assert!(matches!(result, Err(EqualizerError::Cancelled)));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_resolver_failure_propagates() -> Result<()> {
    let collection = ChunkCollection::new(ns(), chunks(), Arc::new(FailingResolver))?;
    assert_eq!(collection.size(0).await?, 1000);
    assert!(matches!(
        collection.size(1).await,
        Err(EqualizerError::ChunkSize(_))
    ));
    assert!(matches!(
        collection.size(99).await,
        Err(EqualizerError::NotFound(_))
    ));
    Ok(())
}
