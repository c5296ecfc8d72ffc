//! Firmware change monitor
//!
//! Walks every configured device and variant once, in order:
//! fetch → parse → load previous snapshot → compare → report → save.
//! Fetch and parse failures only skip the affected feed. Snapshot store
//! failures abort the run.

use anyhow::{Context, Result};
use chrono::Local;
use fota_tracker_core::{
    compare, parse_feed, DeviceRegistry, DeviceSpec, FirmwareVariant, SnapshotStore,
};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::feed_fetch::FeedSource;

/// Counters for one pass over all feeds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Feeds fetched, parsed, compared and saved
    pub checked: usize,
    /// Feeds skipped because of fetch or parse failures
    pub skipped: usize,
    /// Checked feeds that reported at least one change
    pub changed: usize,
    /// Total number of reported changes
    pub changes: usize,
}

/// Checks all feeds of a device registry against stored snapshots
pub struct Monitor<F, S> {
    registry: DeviceRegistry,
    feeds: F,
    store: S,
}

impl<F: FeedSource, S: SnapshotStore> Monitor<F, S> {
    pub fn new(registry: DeviceRegistry, feeds: F, store: S) -> Self {
        Self {
            registry,
            feeds,
            store,
        }
    }

    /// Run one pass over every device and variant, writing the report to `out`
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<RunSummary> {
        writeln!(
            out,
            "Firmware tracking started: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        let mut summary = RunSummary::default();
        for device in self.registry.devices() {
            writeln!(out, "Checking {} ({}, CSC: {})", device.name, device.model, device.csc)?;

            for (variant, url) in device.feeds() {
                self.check_feed(device, variant, url, out, &mut summary).await?;
            }

            writeln!(out, "{}", "-".repeat(50))?;
        }

        info!(
            checked = summary.checked,
            skipped = summary.skipped,
            changed = summary.changed,
            changes = summary.changes,
            "Firmware check complete"
        );

        Ok(summary)
    }

    async fn check_feed<W: Write>(
        &self,
        device: &DeviceSpec,
        variant: FirmwareVariant,
        url: &str,
        out: &mut W,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let Some(text) = self.feeds.fetch(url).await else {
            writeln!(out, "No data fetched for {} firmware.", variant)?;
            summary.skipped += 1;
            return Ok(());
        };

        let snapshot = match parse_feed(&text) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(model = %device.model, variant = %variant, url = %url, error = %e, "Failed to parse firmware feed");
                writeln!(out, "Failed to parse {} firmware data.", variant)?;
                summary.skipped += 1;
                return Ok(());
            }
        };

        let previous = self
            .store
            .load(&device.model, variant)
            .with_context(|| format!("Failed to load snapshot for {} {}", device.model, variant))?;

        let changes = match compare(previous.as_ref(), &snapshot, variant.label()) {
            Ok(changes) => changes,
            Err(e) => {
                warn!(model = %device.model, variant = %variant, error = %e, "Failed to compare firmware snapshots");
                writeln!(out, "Failed to parse {} firmware data.", variant)?;
                summary.skipped += 1;
                return Ok(());
            }
        };

        if changes.is_empty() {
            writeln!(out, "No changes for {} firmware.", variant)?;
        } else {
            writeln!(out, "\nChanges for {} ({} firmware):", device.name, variant)?;
            for change in &changes {
                writeln!(out, " - {}", change)?;
            }
            summary.changed += 1;
            summary.changes += changes.len();
        }

        self.store
            .save(&device.model, variant, &snapshot)
            .with_context(|| format!("Failed to save snapshot for {} {}", device.model, variant))?;
        debug!(model = %device.model, variant = %variant, changes = changes.len(), "Feed checked");

        summary.checked += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_fetch::HttpFeedClient;
    use async_trait::async_trait;
    use fota_tracker_core::{
        CacheError, FileSnapshotStore, Snapshot, VersionRecord, FOTA_BASE_URL,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WATCH_STABLE: &str =
        "http://fota-cloud-dn.ospserver.net/firmware/DBT/SM-L310/version.xml";
    const WATCH_TEST: &str =
        "http://fota-cloud-dn.ospserver.net/firmware/DBT/SM-L310/version.test.xml";
    const PHONE_STABLE: &str =
        "http://fota-cloud-dn.ospserver.net/firmware/EUX/SM-S926B/version.xml";
    const PHONE_TEST: &str =
        "http://fota-cloud-dn.ospserver.net/firmware/EUX/SM-S926B/version.test.xml";

    fn feed(latest: &str, versions: &[(&str, &str)]) -> String {
        let values: String = versions
            .iter()
            .map(|(version, size)| format!(r#"<value rcount="1" fwsize="{}">{}</value>"#, size, version))
            .collect();
        format!(
            "<versioninfo><firmware><version><latest>{}</latest><upgrade>{}</upgrade></version></firmware></versioninfo>",
            latest, values
        )
    }

    #[derive(Default)]
    struct FakeFeeds {
        documents: HashMap<String, String>,
    }

    impl FakeFeeds {
        fn with(mut self, url: &str, document: String) -> Self {
            self.documents.insert(url.to_string(), document);
            self
        }
    }

    #[async_trait]
    impl FeedSource for FakeFeeds {
        async fn fetch(&self, url: &str) -> Option<String> {
            self.documents.get(url).cloned()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        snapshots: Mutex<HashMap<(String, FirmwareVariant), Snapshot>>,
    }

    impl MemoryStore {
        fn get(&self, model: &str, variant: FirmwareVariant) -> Option<Snapshot> {
            self.snapshots
                .lock()
                .unwrap()
                .get(&(model.to_string(), variant))
                .cloned()
        }

        fn put(&self, model: &str, variant: FirmwareVariant, snapshot: Snapshot) {
            self.snapshots
                .lock()
                .unwrap()
                .insert((model.to_string(), variant), snapshot);
        }
    }

    impl SnapshotStore for MemoryStore {
        fn load(&self, model: &str, variant: FirmwareVariant) -> Result<Option<Snapshot>, CacheError> {
            Ok(self.get(model, variant))
        }

        fn save(
            &self,
            model: &str,
            variant: FirmwareVariant,
            snapshot: &Snapshot,
        ) -> Result<(), CacheError> {
            self.put(model, variant, snapshot.clone());
            Ok(())
        }
    }

    struct ReadOnlyStore;

    impl SnapshotStore for ReadOnlyStore {
        fn load(&self, _: &str, _: FirmwareVariant) -> Result<Option<Snapshot>, CacheError> {
            Ok(None)
        }

        fn save(&self, _: &str, _: FirmwareVariant, _: &Snapshot) -> Result<(), CacheError> {
            Err(CacheError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only data directory",
            )))
        }
    }

    fn all_feeds() -> FakeFeeds {
        FakeFeeds::default()
            .with(WATCH_STABLE, feed("W1", &[("W1", "1024")]))
            .with(WATCH_TEST, feed("W2", &[("W2", "2048")]))
            .with(PHONE_STABLE, feed("P1", &[("P1", "1073741824")]))
            .with(PHONE_TEST, feed("P2", &[]))
    }

    async fn run_to_string<F: FeedSource, S: SnapshotStore>(
        monitor: &Monitor<F, S>,
    ) -> (RunSummary, String) {
        let mut out = Vec::new();
        let summary = monitor.run(&mut out).await.unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_first_run_reports_first_observation() {
        let monitor = Monitor::new(
            DeviceRegistry::builtin(FOTA_BASE_URL),
            all_feeds(),
            MemoryStore::default(),
        );

        let (summary, output) = run_to_string(&monitor).await;
        assert_eq!(
            summary,
            RunSummary {
                checked: 4,
                skipped: 0,
                changed: 4,
                changes: 4,
            }
        );
        assert!(output.starts_with("Firmware tracking started: "));
        assert!(output.contains("Checking Galaxy Watch7 (SM-L310, CSC: DBT)"));
        assert!(output.contains("Changes for Galaxy S24+ (test firmware):\n - First check for Test firmware."));
        assert_eq!(output.matches(&"-".repeat(50)).count(), 2);

        // Devices are reported in registry order
        let watch = output.find("Galaxy Watch7").unwrap();
        let phone = output.find("Galaxy S24+").unwrap();
        assert!(watch < phone);

        let stored = monitor.store.get("SM-S926B", FirmwareVariant::Stable).unwrap();
        assert_eq!(stored.latest.as_deref(), Some("P1"));
        assert_eq!(stored.versions, vec![VersionRecord::new("P1", "1", "1073741824")]);
    }

    #[tokio::test]
    async fn test_second_run_without_changes() {
        let monitor = Monitor::new(
            DeviceRegistry::builtin(FOTA_BASE_URL),
            all_feeds(),
            MemoryStore::default(),
        );
        run_to_string(&monitor).await;

        let (summary, output) = run_to_string(&monitor).await;
        assert_eq!(summary.checked, 4);
        assert_eq!(summary.changes, 0);
        assert_eq!(output.matches("No changes for stable firmware.").count(), 2);
        assert_eq!(output.matches("No changes for test firmware.").count(), 2);
    }

    #[tokio::test]
    async fn test_reports_changes_against_stored_snapshot() {
        let store = MemoryStore::default();
        store.put(
            "SM-L310",
            FirmwareVariant::Stable,
            Snapshot {
                latest: Some("A".to_string()),
                versions: vec![VersionRecord::new("V1", "1", "100")],
            },
        );
        let feeds = all_feeds().with(WATCH_STABLE, feed("B", &[("V1", "200"), ("V2", "50")]));
        let monitor = Monitor::new(DeviceRegistry::builtin(FOTA_BASE_URL), feeds, store);

        let (_, output) = run_to_string(&monitor).await;
        assert!(output.contains(
            "Changes for Galaxy Watch7 (stable firmware):\n\
             \x20- New Stable 'latest' version: B (was: A)\n\
             \x20- Stable version V1 changed: new size 200 Bytes (was: 100 Bytes)\n\
             \x20- New Stable version added: V2 (size: 50 Bytes)\n"
        ));

        // The new snapshot replaces the stored one
        let stored = monitor.store.get("SM-L310", FirmwareVariant::Stable).unwrap();
        assert_eq!(stored.latest.as_deref(), Some("B"));
        assert_eq!(stored.versions.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_malformed_feeds_are_skipped() {
        let store = MemoryStore::default();
        let previous = Snapshot {
            latest: Some("OLD".to_string()),
            versions: Vec::new(),
        };
        store.put("SM-L310", FirmwareVariant::Test, previous.clone());
        store.put("SM-S926B", FirmwareVariant::Stable, previous.clone());

        let mut feeds = all_feeds();
        feeds.documents.remove(WATCH_TEST);
        let feeds = feeds.with(PHONE_STABLE, "<versioninfo><latest>".to_string());
        let monitor = Monitor::new(DeviceRegistry::builtin(FOTA_BASE_URL), feeds, store);

        let (summary, output) = run_to_string(&monitor).await;
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.skipped, 2);
        assert!(output.contains("No data fetched for test firmware."));
        assert!(output.contains("Failed to parse stable firmware data."));

        // Skipped feeds keep their previous snapshot
        assert_eq!(monitor.store.get("SM-L310", FirmwareVariant::Test), Some(previous.clone()));
        assert_eq!(monitor.store.get("SM-S926B", FirmwareVariant::Stable), Some(previous));

        // The remaining feeds were still processed
        assert!(monitor.store.get("SM-L310", FirmwareVariant::Stable).is_some());
        assert!(monitor.store.get("SM-S926B", FirmwareVariant::Test).is_some());
    }

    #[tokio::test]
    async fn test_save_failure_aborts_run() {
        let monitor = Monitor::new(DeviceRegistry::builtin(FOTA_BASE_URL), all_feeds(), ReadOnlyStore);

        let mut out = Vec::new();
        let err = monitor.run(&mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to save snapshot for SM-L310 stable"));
        assert!(format!("{:#}", err).contains("read-only data directory"));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_aborts_run() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path());
        let corrupt = store.snapshot_path("SM-L310", FirmwareVariant::Stable);
        std::fs::write(&corrupt, "{not json").unwrap();

        let monitor = Monitor::new(DeviceRegistry::builtin(FOTA_BASE_URL), all_feeds(), store.clone());
        let mut out = Vec::new();
        let err = monitor.run(&mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load snapshot for SM-L310 stable"));
        assert!(err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<CacheError>(), Some(CacheError::Corrupt { .. }))));

        // The corrupt file is left for inspection and nothing else was written
        assert_eq!(std::fs::read_to_string(&corrupt).unwrap(), "{not json");
        assert!(!store.snapshot_path("SM-L310", FirmwareVariant::Test).exists());
        assert!(!store.snapshot_path("SM-S926B", FirmwareVariant::Stable).exists());
    }

    #[tokio::test]
    async fn test_bad_attribute_syntax_keeps_stored_snapshot() {
        let store = MemoryStore::default();
        let previous = Snapshot {
            latest: Some("OLD".to_string()),
            versions: Vec::new(),
        };
        store.put("SM-L310", FirmwareVariant::Stable, previous.clone());

        let feeds = all_feeds().with(
            WATCH_STABLE,
            r#"<versioninfo><url a="1" a="2"/><latest>NEW</latest></versioninfo>"#.to_string(),
        );
        let monitor = Monitor::new(DeviceRegistry::builtin(FOTA_BASE_URL), feeds, store);

        let (summary, output) = run_to_string(&monitor).await;
        assert_eq!(summary.skipped, 1);
        assert!(output.contains("Failed to parse stable firmware data."));
        assert_eq!(monitor.store.get("SM-L310", FirmwareVariant::Stable), Some(previous));
    }

    #[tokio::test]
    async fn test_end_to_end_with_failing_endpoint() {
        let mock_server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/DBT/SM-L310/version.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed("W1", &[("W1", "1024")])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/DBT/SM-L310/version.test.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/EUX/SM-S926B/version.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed("P1", &[("P1", "4096")])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/EUX/SM-S926B/version.test.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed("P2", &[])))
            .mount(&mock_server)
            .await;

        let store = FileSnapshotStore::new(temp_dir.path().join("firmware_data"));
        // Stored state for the failing feed must survive the run
        let previous = Snapshot {
            latest: Some("T0".to_string()),
            versions: vec![VersionRecord::new("T0", "0", "10")],
        };
        store.save("SM-L310", FirmwareVariant::Test, &previous).unwrap();
        store
            .save(
                "SM-S926B",
                FirmwareVariant::Stable,
                &Snapshot {
                    latest: Some("P0".to_string()),
                    versions: vec![VersionRecord::new("P0", "0", "10")],
                },
            )
            .unwrap();

        let client = HttpFeedClient::new(Duration::from_secs(10)).unwrap();
        let monitor = Monitor::new(
            DeviceRegistry::builtin(&mock_server.uri()),
            client,
            store.clone(),
        );

        let (summary, output) = run_to_string(&monitor).await;
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.skipped, 1);
        assert!(output.contains("No data fetched for test firmware."));
        assert!(output.contains(" - First check for Stable firmware."));
        assert!(output.contains(" - New Stable 'latest' version: P1 (was: P0)"));
        assert!(output.contains(" - New Stable version added: P1 (size: 4.00 KB)"));
        assert!(output.contains(" - Stable version removed: P0"));

        assert_eq!(store.load("SM-L310", FirmwareVariant::Test).unwrap(), Some(previous));
        let phone = store.load("SM-S926B", FirmwareVariant::Stable).unwrap().unwrap();
        assert_eq!(phone.latest.as_deref(), Some("P1"));
        let phone_test = store.load("SM-S926B", FirmwareVariant::Test).unwrap().unwrap();
        assert_eq!(phone_test, Snapshot { latest: Some("P2".to_string()), versions: Vec::new() });
    }
}
