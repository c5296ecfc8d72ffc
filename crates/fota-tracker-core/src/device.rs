//! Device registry types for tracked FOTA feeds

use std::collections::BTreeMap;

use crate::firmware::FirmwareVariant;

/// Default FOTA server base URL
pub const FOTA_BASE_URL: &str = "http://fota-cloud-dn.ospserver.net/firmware";

/// Build the feed URL for a device and variant
///
/// URL pattern: {base}/{csc}/{model}/version.xml (stable) or version.test.xml (test)
pub fn construct_feed_url(base_url: &str, csc: &str, model: &str, variant: FirmwareVariant) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{}/{}/{}/{}", base, csc, model, variant.feed_file())
}

/// A device whose firmware feeds are tracked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Display name (e.g., "Galaxy S24+")
    pub name: String,
    /// Hardware model identifier (e.g., "SM-S926B")
    pub model: String,
    /// Region/carrier code
    pub csc: String,
    /// Feed URL per variant, iterated stable first
    pub urls: BTreeMap<FirmwareVariant, String>,
}

impl DeviceSpec {
    /// Create a device with both variant feeds on the given FOTA server
    pub fn on_fota_server(
        base_url: &str,
        name: impl Into<String>,
        model: impl Into<String>,
        csc: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let csc = csc.into();
        let urls = FirmwareVariant::ALL
            .into_iter()
            .map(|variant| (variant, construct_feed_url(base_url, &csc, &model, variant)))
            .collect();
        Self {
            name: name.into(),
            model,
            csc,
            urls,
        }
    }

    /// Feeds in check order
    pub fn feeds(&self) -> impl Iterator<Item = (FirmwareVariant, &str)> {
        self.urls.iter().map(|(variant, url)| (*variant, url.as_str()))
    }
}

/// Immutable, ordered set of tracked devices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: Vec<DeviceSpec>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<DeviceSpec>) -> Self {
        Self { devices }
    }

    /// The devices tracked out of the box
    pub fn builtin(base_url: &str) -> Self {
        Self::new(vec![
            DeviceSpec::on_fota_server(base_url, "Galaxy Watch7", "SM-L310", "DBT"),
            DeviceSpec::on_fota_server(base_url, "Galaxy S24+", "SM-S926B", "EUX"),
        ])
    }

    pub fn devices(&self) -> &[DeviceSpec] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
