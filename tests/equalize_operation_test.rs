use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use shard_equalizer::{
    Cancellation, Chunk, ChunkMoveEvent, ChunkMoveObserver, ClusterSnapshot, CollectionNamespace, CollectionStatistics,
    CommandPlanWriter, CorrectionMode, DeviationOperation, EqualizeOperation, EqualizeOptions,
    EqualizeReport, EqualizerConfig, EqualizerError, Interval, KeyValue, PreSplitMode, Result,
    Shard, ShardId, ShardKey, SnapshotSource, TagId, TagRange,
};

fn key(n: i64) -> ShardKey {
    ShardKey::single("_id", KeyValue::Number(n))
}

fn users() -> CollectionNamespace {
    CollectionNamespace::new("db", "users")
}

/// Three shards with one zone each over `db.users`: 300 / 100 / 100 bytes
/// in chunks of ten keys (30 bytes each in zone a, 10 in the others).
fn snapshot() -> ClusterSnapshot {
    let mut snapshot = ClusterSnapshot {
        shards: ["a", "b", "c"].iter().map(|t| Shard::new(*t, [*t])).collect(),
        collections: vec![CollectionStatistics::sharded(
            users(),
            [
                (ShardId::new("a"), 300),
                (ShardId::new("b"), 100),
                (ShardId::new("c"), 100),
            ],
        )],
        ..ClusterSnapshot::default()
    };

    let mut ranges = Vec::new();
    let mut chunks = Vec::new();
    for (zone, tag) in ["a", "b", "c"].iter().enumerate() {
        let start = zone as i64 * 100;
        ranges.push(TagRange::new(key(start), key(start + 100), *tag));
        let size = if zone == 0 { 30 } else { 10 };
        for min in (start..start + 100).step_by(10) {
            chunks.push(Chunk::new(key(min), key(min + 10), *tag).with_size(size));
        }
    }
    snapshot.tag_ranges.insert(users(), ranges);
    snapshot.chunks.insert(users(), chunks);
    snapshot
}

fn interval(zones: &[&str]) -> Interval {
    Interval {
        namespace: users(),
        min: None,
        max: None,
        zones: zones.iter().map(|z| TagId::new(*z)).collect(),
        pre_split: PreSplitMode::None,
        correction: CorrectionMode::Keep,
        priority: 1.0,
    }
}

async fn run(
    snapshot: ClusterSnapshot,
    intervals: Vec<Interval>,
    options: EqualizeOptions,
    cancel: &Cancellation,
) -> (Result<EqualizeReport>, String) {
    let source = Arc::new(SnapshotSource::new(snapshot));
    let operation = match EqualizeOperation::new(source, intervals, options) {
        Ok(operation) => operation,
        Err(e) => return (Err(e), String::new()),
    };
    let mut plan = match CommandPlanWriter::new(Vec::new()) {
        Ok(plan) => plan,
        Err(e) => return (Err(e), String::new()),
    };
    let report = operation.run(&mut plan, cancel).await;
    let text = String::from_utf8(plan.into_inner()).unwrap_or_default();
    (report, text)
}

#[tokio::test]
async fn test_equalize_writes_tag_range_plan() -> Result<()> {
    let (report, plan) = run(
        snapshot(),
        vec![interval(&["a", "b", "c"])],
        EqualizeOptions::default(),
        &Cancellation::new(),
    )
    .await;
    let report = report?;

    assert!(plan.starts_with("// date: "));
    assert!(plan.contains("// Found solution with max deviation 1 B by shards"));
    assert!(plan.contains("// Equalize shards from db.users"));
    assert!(plan.contains("// change tags"));
    assert!(plan.contains(
        "sh.removeTagRange( \"db.users\", { \"_id\" : 0 }, { \"_id\" : 100 }, \"a\");"
    ));
    assert!(plan.contains(
        "sh.addTagRange( \"db.users\", { \"_id\" : 0 }, { \"_id\" : 60 }, \"a\");"
    ));
    assert!(plan.contains(
        "sh.addTagRange( \"db.users\", { \"_id\" : 60 }, { \"_id\" : 140 }, \"b\");"
    ));
    assert!(plan.contains(
        "sh.addTagRange( \"db.users\", { \"_id\" : 140 }, { \"_id\" : 300 }, \"c\");"
    ));
    assert!(plan.contains("// ---"));
    assert!(plan.contains("// \tMoved chunks: 10"));
    assert!(!plan.contains("break by limit"));

    // Removes precede adds.
    let last_remove = plan.rfind("sh.removeTagRange").unwrap_or(usize::MAX);
    let first_add = plan.find("sh.addTagRange").unwrap_or(0);
    assert!(last_remove < first_add);

    assert_eq!(report.target_max_deviation, 1);
    assert_eq!(report.moved_chunks, 10);
    let users_report = &report.intervals[0];
    assert_eq!(users_report.initial_deviation, 200);
    assert_eq!(users_report.current_deviation, 20);
    assert_eq!(users_report.unmoved_size, 21);
    assert!(!users_report.stopped_by_limit);
    assert_eq!(
        users_report.tag_ranges[1],
        TagRange::new(key(60), key(140), "b")
    );
    Ok(())
}

#[tokio::test]
async fn test_plan_only_moves_nothing() -> Result<()> {
    let options = EqualizeOptions {
        plan_only: true,
        ..EqualizeOptions::default()
    };
    let (report, plan) = run(
        snapshot(),
        vec![interval(&["a", "b", "c"])],
        options,
        &Cancellation::new(),
    )
    .await;
    let report = report?;

    assert_eq!(report.moved_chunks, 0);
    assert_eq!(report.intervals[0].require_move_size, 201);
    assert!(plan.contains("// Equalize shards from db.users: [a] -> 134 B -> [b] -> 67 B -> [c]"));
    assert!(!plan.contains("sh.addTagRange"));
    Ok(())
}

#[tokio::test]
async fn test_move_limit_stops_early() -> Result<()> {
    let options = EqualizeOptions {
        move_limit: Some(30),
        ..EqualizeOptions::default()
    };
    let (report, plan) = run(
        snapshot(),
        vec![interval(&["a", "b", "c"])],
        options,
        &Cancellation::new(),
    )
    .await;
    let report = report?;

    assert!(plan.contains("// break by limit, unmoved "));
    assert!(plan.contains("// \t\t[b] 30 B"));
    // A third chunk into c would push b below the old minimum.
    assert!(plan.contains("// \t\t[c] 20 B"));
    assert_eq!(report.moved_chunks, 3);
    assert!(report.intervals[0].stopped_by_limit);
    Ok(())
}

#[tokio::test]
async fn test_balanced_cluster_needs_no_correction() -> Result<()> {
    let mut snapshot = snapshot();
    snapshot.collections = vec![CollectionStatistics::sharded(
        users(),
        [
            (ShardId::new("a"), 100),
            (ShardId::new("b"), 100),
            (ShardId::new("c"), 100),
        ],
    )];
    let (report, plan) = run(
        snapshot,
        vec![interval(&["a", "b", "c"])],
        EqualizeOptions::default(),
        &Cancellation::new(),
    )
    .await;

    assert_eq!(report?.moved_chunks, 0);
    assert!(plan.contains("// no correction"));
    assert!(!plan.contains("sh.removeTagRange"));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_run_fails() {
    let cancel = Cancellation::new();
    cancel.cancel();
    let (report, _) = run(
        snapshot(),
        vec![interval(&["a", "b", "c"])],
        EqualizeOptions::default(),
        &cancel,
    )
    .await;
    assert!(matches!(report, Err(EqualizerError::Cancelled)));
}

/// Fires the cancellation as soon as the first chunk crosses a bound.
struct CancelOnMove {
    cancel: Cancellation,
    seen: Mutex<Vec<ChunkMoveEvent>>,
}

impl ChunkMoveObserver for CancelOnMove {
    fn notify(&self, event: &ChunkMoveEvent) {
        self.seen.lock().push(event.clone());
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn test_cancel_mid_run_writes_partial_plan() -> Result<()> {
    let cancel = Cancellation::new();
    let observer = Arc::new(CancelOnMove {
        cancel: cancel.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let source = Arc::new(SnapshotSource::new(snapshot()));
    let mut operation = EqualizeOperation::new(
        source,
        vec![interval(&["a", "b", "c"])],
        EqualizeOptions::default(),
    )?;
    operation.add_observer(observer.clone());

    let mut plan = CommandPlanWriter::new(Vec::new())?;
    let report = operation.run(&mut plan, &cancel).await;
    let plan = String::from_utf8(plan.into_inner()).unwrap_or_default();

    assert!(matches!(report, Err(EqualizerError::Cancelled)));
    assert_eq!(observer.seen.lock().len(), 1);
    assert!(plan.contains(
        "sh.removeTagRange( \"db.users\", { \"_id\" : 0 }, { \"_id\" : 100 }, \"a\");"
    ));
    assert!(plan.contains(
        "sh.addTagRange( \"db.users\", { \"_id\" : 0 }, { \"_id\" : 90 }, \"a\");"
    ));
    assert!(plan.contains(
        "sh.addTagRange( \"db.users\", { \"_id\" : 90 }, { \"_id\" : 200 }, \"b\");"
    ));
    assert!(!plan.contains("\"c\");"));
    assert!(plan.contains("// \tMoved chunks: 1"));
    assert!(plan.contains("// \t\t[b] 30 B"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_intervals_rejected() {
    let (report, _) = run(
        snapshot(),
        Vec::new(),
        EqualizeOptions::default(),
        &Cancellation::new(),
    )
    .await;
    assert!(matches!(report, Err(EqualizerError::InvalidConfig(_))));

    let (report, _) = run(
        snapshot(),
        vec![interval(&["a", "b", "c"]), interval(&["a", "b"])],
        EqualizeOptions::default(),
        &Cancellation::new(),
    )
    .await;
    assert!(matches!(report, Err(EqualizerError::InvalidConfig(_))));

    let (report, _) = run(
        snapshot(),
        vec![interval(&["a", "b", "d"])],
        EqualizeOptions::default(),
        &Cancellation::new(),
    )
    .await;
    assert!(matches!(report, Err(EqualizerError::NotFound(_))));
}

#[tokio::test]
async fn test_run_from_config_and_snapshot_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot_path = dir.path().join("snapshot.json");
    snapshot().save(&snapshot_path)?;

    let config_path = dir.path().join("equalizer.toml");
    let mut file = std::fs::File::create(&config_path)?;
    writeln!(
        file,
        r#"
move_limit = "1 KB"
concurrency = 2

[[interval]]
namespace = "db.users"
zones = "a,b,c"
correction = "keep"
"#
    )?;

    let config = EqualizerConfig::load(&config_path)?;
    let options = EqualizeOptions {
        move_limit: config.move_limit()?,
        concurrency: config.concurrency(),
        ..EqualizeOptions::default()
    };
    assert_eq!(options.move_limit, Some(1024));
    assert_eq!(options.concurrency, 2);

    let source = Arc::new(SnapshotSource::load(&snapshot_path)?);
    let operation = EqualizeOperation::new(source, config.intervals()?, options)?;
    let mut plan = CommandPlanWriter::new(Vec::new())?;
    let report = operation.run(&mut plan, &Cancellation::new()).await?;
    assert_eq!(report.moved_chunks, 10);
    Ok(())
}

#[tokio::test]
async fn test_deviation_report_from_snapshot() -> Result<()> {
    let mut snapshot = snapshot();
    snapshot.collections.push(CollectionStatistics::unsharded(
        CollectionNamespace::new("db", "logs"),
        ShardId::new("a"),
        50,
    ));
    let source = Arc::new(SnapshotSource::new(snapshot));

    let report = DeviationOperation::new(source, vec![interval(&["a", "b", "c"])])
        .run()
        .await?;
    assert_eq!(report.shards, vec!["a", "b", "c"]);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].name, "db.users");
    assert_eq!(report.rows[0].correction, Some(CorrectionMode::Keep));
    assert_eq!(report.rows[0].deviation, 200);
    assert_eq!(report.total.sizes, vec![350, 100, 100]);
    assert_eq!(report.total.deviation, 250);

    let csv = report.to_csv()?;
    assert!(csv.contains("db.users,keep,300,100,100,500,200"));
    Ok(())
}
