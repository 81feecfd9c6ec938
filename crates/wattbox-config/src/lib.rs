//! Configuration for WattBox hosts.
//!
//! TOML device list, `WATTBOX_` environment overrides, password
//! resolution (env + keyring + plaintext), and translation to
//! `wattbox_core::DeviceConfig`. Nothing here talks to a device.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use wattbox_api::{Credentials, DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_USER};
use wattbox_core::config::{DEFAULT_NAME, DEFAULT_SCAN_INTERVAL, DEFAULT_TIMEOUT};
use wattbox_core::{DeviceConfig, NameFilter, Resource};

/// Keyring service every device password is stored under.
pub const KEYRING_SERVICE: &str = "wattbox";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Values inherited by every device that doesn't set its own.
    #[serde(default)]
    pub defaults: Defaults,

    /// One entry per WattBox.
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Polling period in seconds; 0 disables polling.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    /// Bound on a single device call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            scan_interval: default_scan_interval(),
            timeout: default_timeout(),
        }
    }
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL.as_secs()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// A single `[[devices]]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Hostname or IP address. Required.
    #[serde(default)]
    pub host: String,

    /// 22 selects SSH, 23 telnet, anything else HTTP.
    pub port: Option<u16>,

    pub username: Option<String>,

    /// Plaintext password (prefer `password_env` or the keyring).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Display name and registration key.
    pub name: Option<String>,

    /// Override `defaults.scan_interval`.
    pub scan_interval: Option<u64>,

    /// Override `defaults.timeout`.
    pub timeout: Option<u64>,

    /// Regex extracting the display fragment from outlet names.
    pub name_regexp: Option<String>,

    /// Regex hiding matching outlets.
    pub skip_regexp: Option<String>,

    /// Telemetry identifiers to expose. Absent means all of them.
    pub resources: Option<Vec<String>>,
}

impl DeviceEntry {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NAME)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "wattbox", "wattbox").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wattbox");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// `WATTBOX_DEFAULTS__SCAN_INTERVAL=60` overrides `defaults.scan_interval`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading configuration");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WATTBOX_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Where passwords are looked up besides the config file itself.
struct SecretSources<'a> {
    env: &'a dyn Fn(&str) -> Option<String>,
    keyring: &'a dyn Fn(&str) -> Option<String>,
}

impl SecretSources<'static> {
    fn system() -> Self {
        Self {
            env: &env_var,
            keyring: &keyring_password,
        }
    }
}

/// Resolve a device password: `password_env`, keyring, plaintext, default.
pub fn resolve_password(entry: &DeviceEntry) -> SecretString {
    resolve_password_with(entry, &SecretSources::system())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn keyring_password(device: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{device}/password"))
        .ok()?
        .get_password()
        .ok()
}

fn resolve_password_with(entry: &DeviceEntry, sources: &SecretSources<'_>) -> SecretString {
    // 1. Entry's password_env → env var lookup
    if let Some(val) = entry.password_env.as_deref().and_then(sources.env) {
        return SecretString::from(val);
    }

    // 2. System keyring
    if let Some(pw) = (sources.keyring)(entry.display_name()) {
        return SecretString::from(pw);
    }

    // 3. Plaintext in config, then the factory default
    SecretString::from(
        entry
            .password
            .clone()
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_owned()),
    )
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `DeviceConfig` from one entry, inheriting `defaults`.
pub fn entry_to_device_config(
    entry: &DeviceEntry,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    translate(entry, defaults, &SecretSources::system())
}

/// Every configured device, validated. Names must be unique.
pub fn device_configs(cfg: &Config) -> Result<Vec<DeviceConfig>, ConfigError> {
    device_configs_with(cfg, &SecretSources::system())
}

fn device_configs_with(
    cfg: &Config,
    sources: &SecretSources<'_>,
) -> Result<Vec<DeviceConfig>, ConfigError> {
    let mut seen = HashSet::new();
    cfg.devices
        .iter()
        .map(|entry| {
            let device = translate(entry, &cfg.defaults, sources)?;
            if !seen.insert(device.name.clone()) {
                return Err(ConfigError::validation(
                    "name",
                    format!("device '{}' is configured more than once", device.name),
                ));
            }
            Ok(device)
        })
        .collect()
}

fn translate(
    entry: &DeviceEntry,
    defaults: &Defaults,
    sources: &SecretSources<'_>,
) -> Result<DeviceConfig, ConfigError> {
    let name = entry.display_name().to_owned();

    let host = entry.host.trim();
    if host.is_empty() {
        return Err(ConfigError::validation(
            "host",
            format!("device '{name}' has no host"),
        ));
    }

    let timeout = entry.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::validation(
            "timeout",
            format!("device '{name}' needs a timeout of at least one second"),
        ));
    }

    let resources = match &entry.resources {
        None => Resource::all(),
        Some(ids) => parse_resources(&name, ids)?,
    };

    let credentials = Credentials {
        username: entry
            .username
            .clone()
            .unwrap_or_else(|| DEFAULT_USER.to_owned()),
        password: resolve_password_with(entry, sources),
    };

    Ok(DeviceConfig {
        host: host.to_owned(),
        port: entry.port.unwrap_or(DEFAULT_PORT),
        credentials,
        scan_interval: Duration::from_secs(entry.scan_interval.unwrap_or(defaults.scan_interval)),
        timeout: Duration::from_secs(timeout),
        name_pattern: usable_pattern(&name, PatternField::Name, entry.name_regexp.as_deref()),
        skip_pattern: usable_pattern(&name, PatternField::Skip, entry.skip_regexp.as_deref()),
        resources,
        name,
    })
}

fn parse_resources(device: &str, ids: &[String]) -> Result<Vec<Resource>, ConfigError> {
    let mut resources: Vec<Resource> = Vec::with_capacity(ids.len());
    for id in ids {
        let resource: Resource = id
            .parse()
            .map_err(|e| ConfigError::validation("resources", format!("device '{device}': {e}")))?;
        if !resources.contains(&resource) {
            resources.push(resource);
        }
    }
    Ok(resources)
}

#[derive(Debug, Clone, Copy)]
enum PatternField {
    Name,
    Skip,
}

/// Keep a pattern only if it compiles; a bad one is dropped with a warning.
fn usable_pattern(device: &str, field: PatternField, pattern: Option<&str>) -> Option<String> {
    let pattern = pattern?;
    let checked = match field {
        PatternField::Name => NameFilter::strict(Some(pattern), None),
        PatternField::Skip => NameFilter::strict(None, Some(pattern)),
    };
    match checked {
        Ok(_) => Some(pattern.to_owned()),
        Err(err) => {
            warn!(device, error = %err, "ignoring invalid outlet pattern");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
[defaults]
scan_interval = 45

[[devices]]
host = "192.168.1.20"
name = "Rack PDU"
scan_interval = 15
name_regexp = '^(\w+)\s'
skip_regexp = '^Router'
resources = ["power_value", "battery_health"]

[[devices]]
host = "192.168.1.21"
port = 22
username = "admin"
password = "hunter2"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn no_secret(_: &str) -> Option<String> {
        None
    }

    /// Neither environment nor keyring holds anything.
    fn offline() -> SecretSources<'static> {
        SecretSources {
            env: &no_secret,
            keyring: &no_secret,
        }
    }

    fn entry(host: &str) -> DeviceEntry {
        DeviceEntry {
            host: host.into(),
            ..DeviceEntry::default()
        }
    }

    #[test]
    fn loads_devices_from_file() {
        let file = write_config(SAMPLE);
        let cfg = load_config_from(file.path()).unwrap();

        assert_eq!(cfg.defaults.scan_interval, 45);
        assert_eq!(cfg.defaults.timeout, 10);
        assert_eq!(cfg.devices.len(), 2);
        assert_eq!(cfg.devices[0].name.as_deref(), Some("Rack PDU"));
        assert_eq!(cfg.devices[1].port, Some(22));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.defaults.scan_interval, 30);
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("[[devices]\nhost = ");
        assert!(matches!(
            load_config_from(file.path()),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn translates_entries_with_inherited_defaults() {
        let file = write_config(SAMPLE);
        let cfg = load_config_from(file.path()).unwrap();
        let devices = device_configs_with(&cfg, &offline()).unwrap();

        let rack = &devices[0];
        assert_eq!(rack.name, "Rack PDU");
        assert_eq!(rack.port, 80);
        assert_eq!(rack.scan_interval, Duration::from_secs(15));
        assert_eq!(rack.name_pattern.as_deref(), Some(r"^(\w+)\s"));
        assert_eq!(rack.resources.len(), 2);
        assert_eq!(rack.resources[0].id(), "power_value");

        let closet = &devices[1];
        assert_eq!(closet.name, "WattBox");
        assert_eq!(closet.scan_interval, Duration::from_secs(45));
        assert_eq!(closet.endpoint().transport(), wattbox_api::TransportKind::Ssh);
        assert_eq!(closet.credentials.username, "admin");
        assert_eq!(closet.credentials.password.expose_secret(), "hunter2");
        assert_eq!(closet.resources, Resource::all());
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = translate(&entry("  "), &Defaults::default(), &offline()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "host"));
    }

    #[test]
    fn unknown_resource_is_rejected() {
        let bad = DeviceEntry {
            resources: Some(vec!["power_value".into(), "humidity".into()]),
            ..entry("10.0.0.2")
        };
        let err = translate(&bad, &Defaults::default(), &offline()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "resources"));
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn invalid_pattern_is_disabled_not_fatal() {
        let bad = DeviceEntry {
            name_regexp: Some("(unclosed".into()),
            skip_regexp: Some("^Spare".into()),
            ..entry("10.0.0.2")
        };
        let device = translate(&bad, &Defaults::default(), &offline()).unwrap();
        assert_eq!(device.name_pattern, None);
        assert_eq!(device.skip_pattern.as_deref(), Some("^Spare"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let cfg = Config {
            defaults: Defaults::default(),
            devices: vec![entry("10.0.0.2"), entry("10.0.0.3")],
        };
        let err = device_configs_with(&cfg, &offline()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let per_device = DeviceEntry {
            timeout: Some(0),
            ..entry("10.0.0.2")
        };
        let err = translate(&per_device, &Defaults::default(), &offline()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "timeout"));

        let file = write_config("[defaults]\ntimeout = 0\n\n[[devices]]\nhost = \"10.0.0.2\"\n");
        let cfg = load_config_from(file.path()).unwrap();
        let err = device_configs_with(&cfg, &offline()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "timeout"));
    }

    #[test]
    fn zero_scan_interval_is_allowed() {
        let quiet = DeviceEntry {
            scan_interval: Some(0),
            timeout: Some(4),
            ..entry("10.0.0.9")
        };
        let device = translate(&quiet, &Defaults::default(), &offline()).unwrap();
        assert!(device.scan_interval.is_zero());
        assert_eq!(device.timeout, Duration::from_secs(4));
    }

    #[test]
    fn password_prefers_env_then_keyring_then_plaintext() {
        let configured = DeviceEntry {
            name: Some("Rack PDU".into()),
            password: Some("plain".into()),
            password_env: Some("RACK_PW".into()),
            ..entry("10.0.0.2")
        };
        let env = |var: &str| (var == "RACK_PW").then(|| "from-env".to_owned());
        let keyring = |device: &str| (device == "Rack PDU").then(|| "from-keyring".to_owned());

        let everything = SecretSources {
            env: &env,
            keyring: &keyring,
        };
        let pw = resolve_password_with(&configured, &everything);
        assert_eq!(pw.expose_secret(), "from-env");

        let keyring_only = SecretSources {
            env: &no_secret,
            keyring: &keyring,
        };
        let pw = resolve_password_with(&configured, &keyring_only);
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_with(&configured, &offline());
        assert_eq!(pw.expose_secret(), "plain");

        let pw = resolve_password_with(&entry("10.0.0.2"), &offline());
        assert_eq!(pw.expose_secret(), "wattbox");
    }
}
