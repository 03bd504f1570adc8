//! Runs built on top of the equalizing engine.

pub mod cancel;
pub mod deviation;
pub mod equalize;
pub mod pressure;

pub use cancel::Cancellation;
pub use deviation::{DeviationOperation, DeviationReport, DeviationRow};
pub use equalize::{EqualizeOperation, EqualizeOptions, EqualizeReport, IntervalReport};
pub use pressure::MovePressureTracker;
