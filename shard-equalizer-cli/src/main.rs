mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::{deviation, equalize, intervals};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Equalize(cmd) => equalize::run(cmd, &cli.snapshot, &cli.config).await,
        Command::Deviation(cmd) => deviation::run(cmd, &cli.snapshot, &cli.config).await,
        Command::Intervals(cmd) => intervals::run(cmd, &cli.config),
    }
}
