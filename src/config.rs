//! TOML configuration of an equalize run.
//!
//! ```toml
//! move_limit = "2GB"
//! concurrency = 32
//!
//! [[interval]]
//! namespace = "db.coll"
//! min_bound = '{ "_id": 0 }'
//! zones = ["tagA", "tagB"]
//! correction = "unshard"
//! priority = 2.0
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EqualizerError, Result};
use crate::model::{CollectionNamespace, ShardKey, TagId};
use crate::util::size::parse_size;

/// How the chunks of an interval are pre-split. Recorded for reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreSplitMode {
    #[default]
    None,
    Interval,
    Chunks,
}

/// Whether and how the sizes of an interval are corrected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMode {
    /// Leave the interval untouched.
    None,
    /// Balance the collection itself.
    #[default]
    Keep,
    /// Also counterbalance the shards' un-sharded data.
    UnShard,
}

impl fmt::Display for CorrectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CorrectionMode::None => "none",
            CorrectionMode::Keep => "keep",
            CorrectionMode::UnShard => "unshard",
        })
    }
}

impl fmt::Display for PreSplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PreSplitMode::None => "none",
            PreSplitMode::Interval => "interval",
            PreSplitMode::Chunks => "chunks",
        })
    }
}

/// A size given either as a byte count or as a string like `"2GB"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSetting {
    Bytes(u64),
    Text(String),
}

impl SizeSetting {
    pub fn bytes(&self) -> Result<u64> {
        match self {
            SizeSetting::Bytes(bytes) => Ok(*bytes),
            SizeSetting::Text(text) => parse_size(text),
        }
    }
}

/// Zone tags given as a list or as a comma separated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneList {
    List(Vec<String>),
    Text(String),
}

impl ZoneList {
    fn tags(&self) -> Vec<TagId> {
        let names: Vec<&str> = match self {
            ZoneList::List(list) => list.iter().map(String::as_str).collect(),
            ZoneList::Text(text) => text.split(',').collect(),
        };
        names
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(TagId::from)
            .collect()
    }
}

/// One `[[interval]]` table as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalConfig {
    pub namespace: String,
    #[serde(default)]
    pub min_bound: Option<String>,
    #[serde(default)]
    pub max_bound: Option<String>,
    pub zones: ZoneList,
    #[serde(default)]
    pub pre_split: PreSplitMode,
    #[serde(default)]
    pub correction: CorrectionMode,
    #[serde(default)]
    pub priority: Option<f64>,
}

/// A validated interval of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub namespace: CollectionNamespace,
    pub min: Option<ShardKey>,
    pub max: Option<ShardKey>,
    pub zones: Vec<TagId>,
    pub pre_split: PreSplitMode,
    pub correction: CorrectionMode,
    pub priority: f64,
}

impl Interval {
    pub fn is_adjustable(&self) -> bool {
        self.correction != CorrectionMode::None
    }
}

impl TryFrom<&IntervalConfig> for Interval {
    type Error = EqualizerError;

    fn try_from(config: &IntervalConfig) -> Result<Self> {
        let namespace: CollectionNamespace = config
            .namespace
            .parse()
            .map_err(|e: EqualizerError| EqualizerError::invalid_config(e.to_string()))?;

        let zones = config.zones.tags();
        if zones.is_empty() {
            return Err(EqualizerError::invalid_config(format!(
                "interval {namespace} has no zones"
            )));
        }

        let parse_bound = |text: &Option<String>, which: &str| -> Result<Option<ShardKey>> {
            text.as_deref()
                .map(|t| {
                    ShardKey::parse_json(t).map_err(|e| {
                        EqualizerError::invalid_config(format!(
                            "{which} bound of {namespace}: {e}"
                        ))
                    })
                })
                .transpose()
        };
        let min = parse_bound(&config.min_bound, "min")?;
        let max = parse_bound(&config.max_bound, "max")?;
        if let (Some(min), Some(max)) = (&min, &max)
            && min >= max
        {
            return Err(EqualizerError::invalid_config(format!(
                "interval {namespace} is empty: {min} >= {max}"
            )));
        }

        let priority = config.priority.unwrap_or(1.0);
        if !(priority.is_finite() && priority > 0.0) {
            return Err(EqualizerError::invalid_config(format!(
                "priority of {namespace} must be positive, got {priority}"
            )));
        }

        Ok(Self {
            namespace,
            min,
            max,
            zones,
            pre_split: config.pre_split,
            correction: config.correction,
            priority,
        })
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EqualizerConfig {
    /// Per-shard limit on the volume moved in.
    #[serde(default)]
    pub move_limit: Option<SizeSetting>,
    /// Chunk size resolutions in flight.
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default, rename = "interval")]
    pub intervals: Vec<IntervalConfig>,
}

impl EqualizerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EqualizerError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validated intervals; an empty list is a configuration error.
    pub fn intervals(&self) -> Result<Vec<Interval>> {
        if self.intervals.is_empty() {
            return Err(EqualizerError::invalid_config("interval list is empty"));
        }
        self.intervals.iter().map(Interval::try_from).collect()
    }

    pub fn move_limit(&self) -> Result<Option<u64>> {
        self.move_limit.as_ref().map(SizeSetting::bytes).transpose()
    }

    /// Configured concurrency, or four per CPU, within `1..=64`.
    pub fn concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| num_cpus::get() * 4)
            .clamp(1, 64)
    }
}
