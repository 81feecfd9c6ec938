// ── Runtime device configuration ──
//
// Describes *how* to reach one WattBox and how to present it. Carries
// credential data and polling tuning, but never touches disk: the
// wattbox-config crate (or any host) builds a `DeviceConfig` and hands it in.

use std::time::Duration;

use wattbox_api::{Credentials, DEFAULT_PORT, Endpoint};

use crate::filter::NameFilter;
use crate::model::{DeviceKey, Resource};

/// Display name used when none is configured.
pub const DEFAULT_NAME: &str = "WattBox";
/// Default polling period.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);
/// Default bound on a single device call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Display name; also the key this device is registered under.
    pub name: String,
    pub host: String,
    /// 22 selects SSH, 23 telnet, anything else HTTP.
    pub port: u16,
    pub credentials: Credentials,
    pub scan_interval: Duration,
    /// Per-call bound on connect, refresh and commands.
    pub timeout: Duration,
    pub name_pattern: Option<String>,
    pub skip_pattern: Option<String>,
    /// Telemetry exposed as sensors. Defaults to everything known.
    pub resources: Vec<Resource>,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(&self.name)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port).with_timeout(self.timeout)
    }

    /// Compile the outlet name rules, disabling invalid patterns.
    pub fn name_filter(&self) -> NameFilter {
        NameFilter::new(self.name_pattern.as_deref(), self.skip_pattern.as_deref())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            host: String::new(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            name_pattern: None,
            skip_pattern: None,
            resources: Resource::all(),
        }
    }
}
