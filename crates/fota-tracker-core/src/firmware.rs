//! Firmware snapshot types
//!
//! This module provides types for:
//! - Firmware variants published by the FOTA server (stable and test feeds)
//! - Version records parsed from a feed
//! - Snapshots, the full observed state of one (device, variant) feed

use serde::{Deserialize, Serialize};

use crate::size::{parse_size, SizeError};

/// Firmware feed variant
///
/// Ordering follows the order in which feeds are checked: stable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareVariant {
    /// Released firmware (`version.xml`)
    Stable,
    /// Test/beta firmware (`version.test.xml`)
    Test,
}

impl FirmwareVariant {
    /// All variants, in check order
    pub const ALL: [FirmwareVariant; 2] = [FirmwareVariant::Stable, FirmwareVariant::Test];

    /// Lowercase name used in cache file names and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Test => "test",
        }
    }

    /// Capitalized name used in change reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stable => "Stable",
            Self::Test => "Test",
        }
    }

    /// Name of the feed document on the FOTA server
    pub fn feed_file(&self) -> &'static str {
        match self {
            Self::Stable => "version.xml",
            Self::Test => "version.test.xml",
        }
    }
}

impl std::fmt::Display for FirmwareVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single firmware build listed in a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Build version string, unique within a snapshot
    pub version: String,
    /// Rollout/retry count as published by the server
    #[serde(default = "default_count")]
    pub rcount: String,
    /// Firmware size in bytes as published by the server
    #[serde(default = "default_count")]
    pub fwsize: String,
}

fn default_count() -> String {
    "0".to_string()
}

impl VersionRecord {
    pub fn new(
        version: impl Into<String>,
        rcount: impl Into<String>,
        fwsize: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            rcount: rcount.into(),
            fwsize: fwsize.into(),
        }
    }

    /// Firmware size in bytes
    pub fn size_bytes(&self) -> Result<u64, SizeError> {
        parse_size(&self.fwsize)
    }

    /// Rollout count
    pub fn rollout_count(&self) -> Result<u64, SizeError> {
        parse_size(&self.rcount)
    }
}

/// Observed state of one firmware feed at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Version the server advertises as latest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    /// Listed builds in feed order
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

impl Snapshot {
    /// Latest version, with absence treated as an empty string
    pub fn latest_or_empty(&self) -> &str {
        self.latest.as_deref().unwrap_or("")
    }

    /// Check that every numeric field of every record is a valid count
    pub fn validate(&self) -> Result<(), SizeError> {
        for record in &self.versions {
            record.rollout_count()?;
            record.size_bytes()?;
        }
        Ok(())
    }
}
