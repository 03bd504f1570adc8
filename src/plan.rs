//! Command plan output.
//!
//! A run produces a mongo-shell script of tag range changes for an operator
//! to review and execute. Nothing is applied to the cluster.

pub mod buffer;
pub mod writer;

pub use buffer::TagRangeCommandBuffer;
pub use writer::{CommandPlanSink, CommandPlanWriter};
