//! Human-readable firmware sizes
//!
//! FOTA feeds carry sizes as string-encoded byte counts. They stay strings in
//! snapshots and are only converted here, at the point of display or
//! comparison.

use thiserror::Error;

const KB: u64 = 1 << 10;
const MB: u64 = 1 << 20;
const GB: u64 = 1 << 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("Invalid byte count: {0:?}")]
    InvalidNumber(String),
}

/// Parse a string-encoded byte count
pub fn parse_size(raw: &str) -> Result<u64, SizeError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SizeError::InvalidNumber(raw.to_string()))
}

/// Format a byte count using the largest unit it reaches
///
/// Byte counts below 1 KB are printed as-is; everything else gets two decimals.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} Bytes", bytes)
    }
}

/// Parse and format a string-encoded byte count
pub fn format_size_str(raw: &str) -> Result<String, SizeError> {
    parse_size(raw).map(format_size)
}
