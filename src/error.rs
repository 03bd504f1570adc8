//! Error types for the shard equalizer.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, EqualizerError>;

/// Errors raised while loading cluster metadata, solving, or planning.
#[derive(Error, Debug)]
pub enum EqualizerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Tag ranges of an interval do not form a contiguous chain.
    #[error("Discontinuous tag ranges: {0}")]
    Discontinuity(String),

    /// No chunk backs a configured interval edge.
    #[error("Missing chunk: {0}")]
    MissingChunk(String),

    /// The zone optimization has no feasible point.
    #[error("Zone optimization is infeasible: {0}")]
    Infeasible(String),

    #[error("Chunk size resolution failed: {0}")]
    ChunkSize(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EqualizerError {
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        EqualizerError::InvalidConfig(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        EqualizerError::InvalidArgument(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        EqualizerError::NotFound(msg.into())
    }

    pub fn discontinuity<S: Into<String>>(msg: S) -> Self {
        EqualizerError::Discontinuity(msg.into())
    }

    pub fn missing_chunk<S: Into<String>>(msg: S) -> Self {
        EqualizerError::MissingChunk(msg.into())
    }

    pub fn infeasible<S: Into<String>>(msg: S) -> Self {
        EqualizerError::Infeasible(msg.into())
    }

    pub fn chunk_size<S: Into<String>>(msg: S) -> Self {
        EqualizerError::ChunkSize(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        EqualizerError::Internal(msg.into())
    }

    /// Whether this error is a cooperative cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EqualizerError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors() {
        let err = EqualizerError::missing_chunk("no chunk at { \"_id\" : MinKey }");
        assert!(matches!(err, EqualizerError::MissingChunk(_)));
        assert_eq!(
            err.to_string(),
            "Missing chunk: no chunk at { \"_id\" : MinKey }"
        );
    }

    #[test]
    fn test_cancelled() {
        assert!(EqualizerError::Cancelled.is_cancelled());
        assert!(!EqualizerError::internal("boom").is_cancelled());
    }
}
