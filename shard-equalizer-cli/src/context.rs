use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use shard_equalizer::{EqualizerConfig, SnapshotSource};

/// Load and parse the TOML configuration.
pub fn load_config(path: &Path) -> Result<EqualizerConfig> {
    if !path.exists() {
        bail!("No configuration found at {}.", path.display());
    }
    EqualizerConfig::load(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

/// Open the cluster snapshot.
pub fn open_snapshot(path: &Path) -> Result<Arc<SnapshotSource>> {
    if !path.exists() {
        bail!("No cluster snapshot found at {}.", path.display());
    }
    let source = SnapshotSource::load(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    Ok(Arc::new(source))
}
