// ── Telemetry definitions ──
//
// Typed identifiers for every scalar reading and boolean flag a WattBox
// reports, with their display metadata. Lookups go through accessor
// functions keyed by these enums; identifiers arrive as strings only at
// configuration time, where `Resource::from_str` validates them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use wattbox_api::StatusReport;

// ── Sensors ─────────────────────────────────────────────────────────

/// Scalar telemetry reported by a unit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    BatteryCharge,
    BatteryLoad,
    CurrentValue,
    EstRunTime,
    PowerValue,
    VoltageValue,
}

impl SensorKind {
    pub fn id(self) -> &'static str {
        self.into()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BatteryCharge => "Battery Charge",
            Self::BatteryLoad => "Battery Load",
            Self::CurrentValue => "Current",
            Self::EstRunTime => "Estimated Run Time",
            Self::PowerValue => "Power",
            Self::VoltageValue => "Voltage",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::BatteryCharge | Self::BatteryLoad => "%",
            Self::CurrentValue => "A",
            Self::EstRunTime => "min",
            Self::PowerValue => "W",
            Self::VoltageValue => "V",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::BatteryCharge => "mdi:battery",
            Self::BatteryLoad => "mdi:gauge",
            Self::CurrentValue => "mdi:current-ac",
            Self::EstRunTime => "mdi:timer",
            Self::PowerValue => "mdi:lightbulb-outline",
            Self::VoltageValue => "mdi:lightning-bolt-circle",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ── Flags ───────────────────────────────────────────────────────────

/// How a host should render a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Sound,
    Problem,
    Connectivity,
    Plug,
    Safety,
}

/// Boolean flags reported by a unit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlagKind {
    AudibleAlarm,
    AutoReboot,
    BatteryHealth,
    BatteryTest,
    CloudStatus,
    HasUps,
    Mute,
    PowerLost,
    SafeVoltageStatus,
}

impl FlagKind {
    pub fn id(self) -> &'static str {
        self.into()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AudibleAlarm => "Audible Alarm",
            Self::AutoReboot => "Auto Reboot",
            Self::BatteryHealth => "Battery Health",
            Self::BatteryTest => "Battery Test",
            Self::CloudStatus => "Cloud Status",
            Self::HasUps => "Has UPS",
            Self::Mute => "Mute",
            Self::PowerLost => "Power",
            Self::SafeVoltageStatus => "Safe Voltage Status",
        }
    }

    pub fn device_class(self) -> Option<DeviceClass> {
        match self {
            Self::AudibleAlarm => Some(DeviceClass::Sound),
            Self::BatteryHealth => Some(DeviceClass::Problem),
            Self::CloudStatus => Some(DeviceClass::Connectivity),
            Self::PowerLost => Some(DeviceClass::Plug),
            Self::SafeVoltageStatus => Some(DeviceClass::Safety),
            Self::AutoReboot | Self::BatteryTest | Self::HasUps | Self::Mute => None,
        }
    }

    /// Whether the raw protocol value means the inverse of the exposed state.
    ///
    /// `battery_health` reports "problem present", `power_lost` reports
    /// "no power", `safe_voltage_status` reports "unsafe".
    pub fn flipped(self) -> bool {
        matches!(
            self,
            Self::BatteryHealth | Self::PowerLost | Self::SafeVoltageStatus
        )
    }

    /// Apply this flag's polarity to a raw value. Unknown stays unknown.
    pub fn expose(self, raw: Option<bool>) -> Option<bool> {
        raw.map(|value| if self.flipped() { !value } else { value })
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ── Resource ────────────────────────────────────────────────────────

/// Any selectable telemetry identifier, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resource {
    Flag(FlagKind),
    Sensor(SensorKind),
}

impl Resource {
    /// Every known identifier: flags first, then sensors.
    pub fn all() -> Vec<Resource> {
        FlagKind::iter()
            .map(Resource::Flag)
            .chain(SensorKind::iter().map(Resource::Sensor))
            .collect()
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::Flag(f) => f.id(),
            Self::Sensor(s) => s.id(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when a configuration names a telemetry identifier we don't know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource '{0}'")]
pub struct UnknownResource(pub String);

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if let Ok(flag) = FlagKind::from_str(&normalized) {
            return Ok(Self::Flag(flag));
        }
        SensorKind::from_str(&normalized)
            .map(Self::Sensor)
            .map_err(|_| UnknownResource(s.to_owned()))
    }
}

impl TryFrom<String> for Resource {
    type Error = UnknownResource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resource> for String {
    fn from(value: Resource) -> Self {
        value.id().to_owned()
    }
}

// ── Values ──────────────────────────────────────────────────────────

/// Scalar readings from one refresh. `None` means not reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub battery_charge: Option<f64>,
    pub battery_load: Option<f64>,
    pub current_value: Option<f64>,
    pub est_run_time: Option<f64>,
    pub power_value: Option<f64>,
    pub voltage_value: Option<f64>,
}

impl Readings {
    pub fn get(&self, kind: SensorKind) -> Option<f64> {
        match kind {
            SensorKind::BatteryCharge => self.battery_charge,
            SensorKind::BatteryLoad => self.battery_load,
            SensorKind::CurrentValue => self.current_value,
            SensorKind::EstRunTime => self.est_run_time,
            SensorKind::PowerValue => self.power_value,
            SensorKind::VoltageValue => self.voltage_value,
        }
    }
}

/// Boolean flags from one refresh, in raw protocol polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub audible_alarm: Option<bool>,
    pub auto_reboot: Option<bool>,
    pub battery_health: Option<bool>,
    pub battery_test: Option<bool>,
    pub cloud_status: Option<bool>,
    pub has_ups: Option<bool>,
    pub mute: Option<bool>,
    pub power_lost: Option<bool>,
    pub safe_voltage_status: Option<bool>,
}

impl Flags {
    /// The value exactly as the device reported it.
    pub fn raw(&self, kind: FlagKind) -> Option<bool> {
        match kind {
            FlagKind::AudibleAlarm => self.audible_alarm,
            FlagKind::AutoReboot => self.auto_reboot,
            FlagKind::BatteryHealth => self.battery_health,
            FlagKind::BatteryTest => self.battery_test,
            FlagKind::CloudStatus => self.cloud_status,
            FlagKind::HasUps => self.has_ups,
            FlagKind::Mute => self.mute,
            FlagKind::PowerLost => self.power_lost,
            FlagKind::SafeVoltageStatus => self.safe_voltage_status,
        }
    }

    /// The value a user should see, after the flag's polarity rule.
    pub fn exposed(&self, kind: FlagKind) -> Option<bool> {
        kind.expose(self.raw(kind))
    }
}

impl From<&StatusReport> for Readings {
    fn from(s: &StatusReport) -> Self {
        Self {
            battery_charge: s.battery_charge,
            battery_load: s.battery_load,
            current_value: s.current_value,
            est_run_time: s.est_run_time,
            power_value: s.power_value,
            voltage_value: s.voltage_value,
        }
    }
}

impl From<&StatusReport> for Flags {
    fn from(s: &StatusReport) -> Self {
        Self {
            audible_alarm: s.audible_alarm,
            auto_reboot: s.auto_reboot,
            battery_health: s.battery_health,
            battery_test: s.battery_test,
            cloud_status: s.cloud_status,
            has_ups: s.has_ups,
            mute: s.mute,
            power_lost: s.power_lost,
            safe_voltage_status: s.safe_voltage_status,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flipped_flag_inverts_raw_value() {
        let flags = Flags {
            battery_health: Some(true),
            ..Flags::default()
        };
        assert_eq!(flags.raw(FlagKind::BatteryHealth), Some(true));
        assert_eq!(flags.exposed(FlagKind::BatteryHealth), Some(false));
    }

    #[test]
    fn unflipped_flag_passes_through() {
        let flags = Flags {
            cloud_status: Some(true),
            mute: Some(false),
            ..Flags::default()
        };
        assert_eq!(flags.exposed(FlagKind::CloudStatus), Some(true));
        assert_eq!(flags.exposed(FlagKind::Mute), Some(false));
    }

    #[test]
    fn unknown_flag_stays_unknown_even_when_flipped() {
        assert_eq!(FlagKind::PowerLost.expose(None), None);
    }

    #[test]
    fn polarity_is_fixed_per_definition() {
        let flipped: Vec<FlagKind> = FlagKind::iter().filter(|f| f.flipped()).collect();
        assert_eq!(
            flipped,
            vec![
                FlagKind::BatteryHealth,
                FlagKind::PowerLost,
                FlagKind::SafeVoltageStatus
            ]
        );
    }

    #[test]
    fn resource_parses_both_families() {
        assert_eq!(
            "battery_health".parse::<Resource>().unwrap(),
            Resource::Flag(FlagKind::BatteryHealth)
        );
        assert_eq!(
            "Power_Value".parse::<Resource>().unwrap(),
            Resource::Sensor(SensorKind::PowerValue)
        );
        assert_eq!(
            "humidity".parse::<Resource>(),
            Err(UnknownResource("humidity".into()))
        );
    }

    #[test]
    fn all_resources_lists_flags_then_sensors() {
        let all = Resource::all();
        assert_eq!(all.len(), 15);
        assert_eq!(all[0], Resource::Flag(FlagKind::AudibleAlarm));
        assert_eq!(all[9], Resource::Sensor(SensorKind::BatteryCharge));
    }

    #[test]
    fn readings_lookup_by_kind() {
        let readings = Readings {
            power_value: Some(120.0),
            ..Readings::default()
        };
        assert_eq!(readings.get(SensorKind::PowerValue), Some(120.0));
        assert_eq!(readings.get(SensorKind::VoltageValue), None);
        assert_eq!(SensorKind::EstRunTime.unit(), "min");
    }
}
