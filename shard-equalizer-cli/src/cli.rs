use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;

/// Shard Equalizer - plan zone boundary changes that even out shard sizes
#[derive(Parser)]
#[command(name = "shard-equalizer", version, about)]
pub struct Cli {
    /// Cluster metadata snapshot (JSON).
    #[arg(long, env = "SHARD_EQUALIZER_SNAPSHOT", default_value = "snapshot.json")]
    pub snapshot: PathBuf,

    /// Configuration file (TOML).
    #[arg(long, env = "SHARD_EQUALIZER_CONFIG", default_value = "equalizer.toml")]
    pub config: PathBuf,

    /// Log filter, e.g. `info` or `shard_equalizer=debug`. `RUST_LOG` wins when set.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute target sizes and write the tag range command plan.
    Equalize(EqualizeCommand),
    /// Report how unevenly collections are spread over the shards.
    Deviation(DeviationCommand),
    /// Show the configured intervals.
    Intervals(IntervalsCommand),
}

// --- Equalize ---

#[derive(Parser)]
pub struct EqualizeCommand {
    /// Write the command plan to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Only solve and report the required shifts, do not move bounds.
    #[arg(long)]
    pub plan_only: bool,

    /// Per-shard limit on moved volume, e.g. `512MB`. Overrides the config.
    #[arg(long)]
    pub move_limit: Option<String>,
}

// --- Deviation ---

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable table.
    Table,
    /// Markdown table.
    Markdown,
    /// CSV with raw byte counts.
    Csv,
}

#[derive(Parser)]
pub struct DeviationCommand {
    /// Report format.
    #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
    pub format: ReportFormat,
}

// --- Intervals ---

#[derive(Parser)]
pub struct IntervalsCommand {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}
