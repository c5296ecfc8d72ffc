//! Snapshot comparison
//!
//! Compares the previously stored snapshot of a feed with a freshly parsed one
//! and produces the list of changes to report, in a stable order:
//! latest-version change first, then added/changed versions in new-feed
//! order, then removed versions in old-feed order.

use std::collections::HashMap;

use crate::firmware::{Snapshot, VersionRecord};
use crate::size::{format_size, SizeError};

/// A single reportable difference between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// No previous snapshot existed for this feed
    FirstObservation { label: String },
    /// The advertised latest version moved
    LatestChanged {
        label: String,
        from: String,
        to: String,
    },
    /// A version appeared in the feed
    Added {
        label: String,
        version: String,
        size: u64,
    },
    /// A listed version changed its firmware size
    SizeChanged {
        label: String,
        version: String,
        old_size: u64,
        new_size: u64,
    },
    /// A version disappeared from the feed
    Removed { label: String, version: String },
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstObservation { label } => write!(f, "First check for {} firmware.", label),
            Self::LatestChanged { label, from, to } => {
                write!(f, "New {} 'latest' version: {} (was: {})", label, to, from)
            }
            Self::Added {
                label,
                version,
                size,
            } => write!(
                f,
                "New {} version added: {} (size: {})",
                label,
                version,
                format_size(*size)
            ),
            Self::SizeChanged {
                label,
                version,
                old_size,
                new_size,
            } => write!(
                f,
                "{} version {} changed: new size {} (was: {})",
                label,
                version,
                format_size(*new_size),
                format_size(*old_size)
            ),
            Self::Removed { label, version } => {
                write!(f, "{} version removed: {}", label, version)
            }
        }
    }
}

/// Versions keyed by version string, in order of first appearance
///
/// A repeated version keeps its first position but takes the later record.
struct VersionIndex<'a> {
    order: Vec<&'a str>,
    by_version: HashMap<&'a str, &'a VersionRecord>,
}

impl<'a> VersionIndex<'a> {
    fn build(records: &'a [VersionRecord]) -> Self {
        let mut order = Vec::with_capacity(records.len());
        let mut by_version = HashMap::with_capacity(records.len());
        for record in records {
            if by_version.insert(record.version.as_str(), record).is_none() {
                order.push(record.version.as_str());
            }
        }
        Self { order, by_version }
    }

    fn get(&self, version: &str) -> Option<&'a VersionRecord> {
        self.by_version.get(version).copied()
    }

    fn contains(&self, version: &str) -> bool {
        self.by_version.contains_key(version)
    }

    fn iter(&self) -> impl Iterator<Item = &'a VersionRecord> + '_ {
        self.order.iter().filter_map(|v| self.get(v))
    }
}

/// Compare a stored snapshot against a fresh one
///
/// Without a stored snapshot the result is a single
/// [`Change::FirstObservation`], regardless of what the new snapshot holds.
/// Identical snapshots produce an empty list.
pub fn compare(
    old: Option<&Snapshot>,
    new: &Snapshot,
    label: &str,
) -> Result<Vec<Change>, SizeError> {
    let Some(old) = old else {
        return Ok(vec![Change::FirstObservation {
            label: label.to_string(),
        }]);
    };

    let mut changes = Vec::new();

    if old.latest_or_empty() != new.latest_or_empty() {
        changes.push(Change::LatestChanged {
            label: label.to_string(),
            from: old.latest_or_empty().to_string(),
            to: new.latest_or_empty().to_string(),
        });
    }

    let old_versions = VersionIndex::build(&old.versions);
    let new_versions = VersionIndex::build(&new.versions);

    for record in new_versions.iter() {
        let new_size = record.size_bytes()?;
        match old_versions.get(&record.version) {
            None => changes.push(Change::Added {
                label: label.to_string(),
                version: record.version.clone(),
                size: new_size,
            }),
            Some(previous) => {
                let old_size = previous.size_bytes()?;
                if old_size != new_size {
                    changes.push(Change::SizeChanged {
                        label: label.to_string(),
                        version: record.version.clone(),
                        old_size,
                        new_size,
                    });
                }
            }
        }
    }

    for record in old_versions.iter() {
        if !new_versions.contains(&record.version) {
            changes.push(Change::Removed {
                label: label.to_string(),
                version: record.version.clone(),
            });
        }
    }

    Ok(changes)
}
