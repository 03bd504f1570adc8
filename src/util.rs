//! Shared utility modules used across the equalizer components.

pub mod size;
