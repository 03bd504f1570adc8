use clap::ValueEnum;
use serde::Serialize;
use shard_equalizer::util::size::ByteSize;
use shard_equalizer::{DeviationReport, EqualizeReport, Interval};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Table,
    /// JSON output.
    Json,
}

#[derive(Tabled, Serialize)]
struct IntervalRow {
    namespace: String,
    min: String,
    max: String,
    zones: String,
    correction: String,
    pre_split: String,
    priority: f64,
}

/// Print the resolved intervals.
pub fn print_intervals(intervals: &[Interval], format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<IntervalRow> = intervals
        .iter()
        .map(|i| IntervalRow {
            namespace: i.namespace.to_string(),
            min: i.min.as_ref().map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
            max: i.max.as_ref().map(|k| k.to_string()).unwrap_or_else(|| "-".into()),
            zones: i
                .zones
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            correction: i.correction.to_string(),
            pre_split: i.pre_split.to_string(),
            priority: i.priority,
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => {
            let table = Table::new(&rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
    }
    Ok(())
}

/// Print the deviation report as a table.
pub fn print_deviation_table(report: &DeviationReport) {
    let mut builder = Builder::default();
    for row in report.table() {
        builder.push_record(row);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

#[derive(Tabled)]
struct EqualizeRow {
    namespace: String,
    required: String,
    moved: String,
    unmoved: String,
    chunks: usize,
    deviation: String,
    limited: bool,
}

/// Print the per-interval summary of an equalize run.
pub fn print_equalize_summary(report: &EqualizeReport) {
    eprintln!(
        "Target max deviation by shards: {}",
        report.target_max_deviation.byte_size()
    );
    let rows: Vec<EqualizeRow> = report
        .intervals
        .iter()
        .map(|i| EqualizeRow {
            namespace: i.namespace.to_string(),
            required: i.require_move_size.byte_size(),
            moved: i.moved_size.byte_size(),
            unmoved: i.unmoved_size.byte_size(),
            chunks: i.moved_chunks,
            deviation: format!(
                "{} -> {}",
                i.initial_deviation.byte_size(),
                i.current_deviation.byte_size()
            ),
            limited: i.stopped_by_limit,
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    eprintln!("{table}");
    eprintln!("Moved chunks: {}", report.moved_chunks);
}
