// ── Device identity types ──
//
// `DeviceKey` names a device inside this process (event topics, manager
// lookups). `DeviceInfo` carries what the unit says about itself; its
// serial number is the durable identity used for stable entity ids.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use wattbox_api::{Endpoint, InfoReport};

// ── DeviceKey ───────────────────────────────────────────────────────

/// Structured identifier for a configured device.
///
/// Wraps the configured display name. Event topics and manager lookups
/// are keyed by this type rather than by formatted strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey(Arc<str>);

impl DeviceKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated or dash-separated hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_lowercase().replace('-', ":");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

// ── DeviceInfo ──────────────────────────────────────────────────────

/// Descriptive identity of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Configured display name.
    pub name: String,
    pub serial_number: String,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,
    pub host: String,
    pub port: u16,
    /// Filled in best-effort by a `MacResolver`, never required.
    pub mac: Option<MacAddress>,
}

impl DeviceInfo {
    pub const MANUFACTURER: &'static str = "WattBox";

    pub(crate) fn from_report(name: &str, endpoint: &Endpoint, report: &InfoReport) -> Self {
        Self {
            name: name.to_owned(),
            serial_number: report.serial_number.clone(),
            model: report.model.clone(),
            firmware_version: report.firmware_version.clone(),
            hardware_version: report.hardware_version.clone(),
            host: endpoint.host.clone(),
            port: endpoint.port,
            mac: None,
        }
    }

    /// Model for display, falling back to the manufacturer name.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(Self::MANUFACTURER)
    }

    /// The unit's own web UI.
    pub fn configuration_url(&self) -> Option<Url> {
        Endpoint::new(self.host.clone(), self.port).configuration_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_key_compares_by_name() {
        assert_eq!(DeviceKey::from("Rack"), DeviceKey::new(String::from("Rack")));
        assert_ne!(DeviceKey::from("Rack"), DeviceKey::from("rack"));
    }

    #[test]
    fn mac_address_normalizes() {
        let mac = MacAddress::new(" AA-BB-CC-DD-EE-FF ");
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn model_falls_back_to_manufacturer() {
        let info = DeviceInfo {
            name: "Rack".into(),
            serial_number: "ST1".into(),
            model: None,
            firmware_version: None,
            hardware_version: None,
            host: "10.0.0.2".into(),
            port: 80,
            mac: None,
        };
        assert_eq!(info.model_or_default(), "WattBox");
        assert_eq!(
            info.configuration_url().map(|u| u.to_string()),
            Some("http://10.0.0.2/".to_owned())
        );
    }
}
