use std::path::Path;

use anyhow::Result;

use crate::cli::IntervalsCommand;
use crate::context;
use crate::output;

/// Execute an intervals command.
pub fn run(cmd: IntervalsCommand, config_path: &Path) -> Result<()> {
    let config = context::load_config(config_path)?;
    let intervals = config.intervals()?;
    output::print_intervals(&intervals, cmd.format)
}
