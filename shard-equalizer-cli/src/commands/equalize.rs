use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use shard_equalizer::util::size::parse_size;
use shard_equalizer::{
    Cancellation, CommandPlanWriter, EqualizeOperation, EqualizeOptions, EqualizerError,
};

use crate::cli::EqualizeCommand;
use crate::context;
use crate::output;

/// Execute an equalize command.
pub async fn run(cmd: EqualizeCommand, snapshot: &Path, config_path: &Path) -> Result<()> {
    let config = context::load_config(config_path)?;
    let source = context::open_snapshot(snapshot)?;

    let move_limit = match &cmd.move_limit {
        Some(text) => Some(parse_size(text).context("Invalid --move-limit")?),
        None => config.move_limit()?,
    };
    let options = EqualizeOptions {
        move_limit,
        plan_only: cmd.plan_only,
        concurrency: config.concurrency(),
    };
    let operation = EqualizeOperation::new(source, config.intervals()?, options)?;

    // Ctrl-C stops between two moves; the plan made so far is still written.
    let cancel = Cancellation::new();
    let handler = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested, finishing the current move");
            handler.cancel();
        }
    });

    let writer: Box<dyn Write> = match &cmd.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create plan file {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    let mut plan = CommandPlanWriter::new(writer)?;

    match operation.run(&mut plan, &cancel).await {
        Ok(report) => {
            output::print_equalize_summary(&report);
            if let Some(path) = &cmd.output {
                tracing::info!("command plan written to {}", path.display());
            }
            Ok(())
        }
        Err(EqualizerError::Cancelled) => {
            tracing::warn!("equalize cancelled, the plan covers the moves made so far");
            Err(EqualizerError::Cancelled.into())
        }
        Err(e) => Err(e.into()),
    }
}
