use std::path::Path;

use anyhow::Result;
use shard_equalizer::DeviationOperation;

use crate::cli::{DeviationCommand, ReportFormat};
use crate::context;
use crate::output;

/// Execute a deviation command.
pub async fn run(cmd: DeviationCommand, snapshot: &Path, config_path: &Path) -> Result<()> {
    let source = context::open_snapshot(snapshot)?;

    // The configuration only annotates the report, so it is optional here.
    let intervals = if config_path.exists() {
        context::load_config(config_path)?.intervals()?
    } else {
        Vec::new()
    };

    let report = DeviationOperation::new(source, intervals).run().await?;
    match cmd.format {
        ReportFormat::Table => output::print_deviation_table(&report),
        ReportFormat::Markdown => print!("{}", report.to_markdown()),
        ReportFormat::Csv => print!("{}", report.to_csv()?),
    }
    Ok(())
}
