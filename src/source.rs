//! Cluster metadata providers.
//!
//! The equalize operation reads everything it needs through
//! [`ClusterSource`]. [`SnapshotSource`] serves a [`ClusterSnapshot`]
//! previously saved to disk.

pub mod provider;
pub mod resolver;
pub mod snapshot;

pub use provider::ClusterSource;
pub use resolver::EstimatingSizeResolver;
pub use snapshot::{ClusterSnapshot, SnapshotSource};
