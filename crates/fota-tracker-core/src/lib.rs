//! fota-tracker Core - Core types, feed parsing, snapshot cache and diffing
//!
//! This crate provides the foundational pieces of the fota-tracker system:
//! - Device registry types for the tracked FOTA feeds
//! - FOTA version feed parsing into snapshots
//! - Snapshot persistence, one JSON file per (model, variant)
//! - Snapshot comparison into reportable changes
//! - Human-readable size formatting

pub mod cache;
pub mod device;
pub mod diff;
pub mod feed;
pub mod firmware;
pub mod size;

pub use cache::{CacheError, FileSnapshotStore, SnapshotStore};
pub use device::{construct_feed_url, DeviceRegistry, DeviceSpec, FOTA_BASE_URL};
pub use diff::{compare, Change};
pub use feed::{parse_feed, FeedError};
pub use firmware::{FirmwareVariant, Snapshot, VersionRecord};
pub use size::{format_size, format_size_str, parse_size, SizeError};
