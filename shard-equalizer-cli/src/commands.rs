pub mod deviation;
pub mod equalize;
pub mod intervals;
