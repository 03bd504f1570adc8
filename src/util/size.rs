//! Human-readable byte sizes.
//!
//! Sizes are rendered with binary multiples (`1 KB = 1024 B`) and two
//! decimals, the way cluster tooling usually prints data volumes. Parsing
//! accepts the same suffixes, case-insensitive, with an optional fraction.

use crate::error::{EqualizerError, Result};

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Renders a byte count as a human-readable string.
pub trait ByteSize {
    fn byte_size(&self) -> String;
}

impl ByteSize for u64 {
    fn byte_size(&self) -> String {
        render(*self as f64)
    }
}

impl ByteSize for i64 {
    fn byte_size(&self) -> String {
        if *self < 0 {
            format!("-{}", render(self.unsigned_abs() as f64))
        } else {
            render(*self as f64)
        }
    }
}

fn render(mut value: f64) -> String {
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[0])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Parse a size such as `512`, `64MB`, `1.5 GB` or `2tb` into bytes.
pub fn parse_size(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EqualizerError::invalid_argument("empty size"));
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| EqualizerError::invalid_argument(format!("invalid size '{text}'")))?;

    let suffix = suffix.trim().to_ascii_uppercase();
    let exponent = match suffix.as_str() {
        "" | "B" => 0,
        "K" | "KB" => 1,
        "M" | "MB" => 2,
        "G" | "GB" => 3,
        "T" | "TB" => 4,
        "P" | "PB" => 5,
        _ => {
            return Err(EqualizerError::invalid_argument(format!(
                "unknown size suffix '{suffix}' in '{text}'"
            )));
        }
    };

    Ok((number * 1024f64.powi(exponent)).round() as u64)
}
