// ── Entity planning ──
//
// Derives the user-facing topology of one device: which switches,
// reset buttons, sensors and binary sensors a host should create, what
// they are called, and the stable ids they are keyed by. Unique ids are
// built from the serial number so they survive renames and host changes.

use std::time::Duration;

use serde::Serialize;
use strum::Display;
use url::Url;

use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::filter::NameFilter;
use crate::model::{
    DeviceClass, DeviceInfo, FlagKind, MacAddress, OutletTarget, Resource, SensorKind,
};
use crate::session::DeviceSession;
use crate::snapshot::DeviceSnapshot;

/// Icon for outlet switches.
pub const PLUG_ICON: &str = "mdi:power-socket-us";

// ── Descriptors ─────────────────────────────────────────────────────

/// Host platform an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Switch,
    Button,
    Sensor,
    BinarySensor,
}

/// One entity a host should create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum EntityDescriptor {
    Switch {
        unique_id: String,
        name: String,
        target: OutletTarget,
    },
    ResetButton {
        unique_id: String,
        name: String,
        target: OutletTarget,
    },
    Sensor {
        unique_id: String,
        name: String,
        kind: SensorKind,
    },
    BinarySensor {
        unique_id: String,
        name: String,
        kind: FlagKind,
    },
}

impl EntityDescriptor {
    pub fn platform(&self) -> Platform {
        match self {
            Self::Switch { .. } => Platform::Switch,
            Self::ResetButton { .. } => Platform::Button,
            Self::Sensor { .. } => Platform::Sensor,
            Self::BinarySensor { .. } => Platform::BinarySensor,
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Switch { unique_id, .. }
            | Self::ResetButton { unique_id, .. }
            | Self::Sensor { unique_id, .. }
            | Self::BinarySensor { unique_id, .. } => unique_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Switch { name, .. }
            | Self::ResetButton { name, .. }
            | Self::Sensor { name, .. }
            | Self::BinarySensor { name, .. } => name,
        }
    }
}

/// How accumulated energy is derived from the power sensor.
///
/// The numeric integration is the host's job; this only describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergyIntegration {
    pub name: String,
    pub unique_id: String,
    /// Host entity id of the power sensor being integrated.
    pub source_entity: String,
    pub method: &'static str,
    pub round_digits: u8,
    pub unit_prefix: &'static str,
    pub unit_time: &'static str,
    pub max_sub_interval: Duration,
}

impl EnergyIntegration {
    fn for_device(name: &str) -> Self {
        let clean = name.replace(' ', "_").to_lowercase();
        Self {
            name: format!("{name} Total Energy"),
            unique_id: format!("{clean}_total_energy"),
            source_entity: format!("sensor.{clean}_power"),
            method: "trapezoidal",
            round_digits: 2,
            unit_prefix: "k",
            unit_time: "h",
            max_sub_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Descriptive identity a host attaches to every entity of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescription {
    /// Durable identifier: the serial number.
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
    pub sw_version: Option<String>,
    pub hw_version: Option<String>,
    pub serial_number: String,
    pub configuration_url: Option<Url>,
    pub mac: Option<MacAddress>,
}

impl From<&DeviceInfo> for DeviceDescription {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            identifier: info.serial_number.clone(),
            name: info.name.clone(),
            manufacturer: DeviceInfo::MANUFACTURER,
            model: info.model_or_default().to_owned(),
            sw_version: info.firmware_version.clone(),
            hw_version: info.hardware_version.clone(),
            serial_number: info.serial_number.clone(),
            configuration_url: info.configuration_url(),
            mac: info.mac.clone(),
        }
    }
}

/// Everything a host needs to represent one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityPlan {
    pub device: DeviceDescription,
    pub entities: Vec<EntityDescriptor>,
    pub energy: Option<EnergyIntegration>,
}

impl EntityPlan {
    pub fn by_platform(&self, platform: Platform) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities
            .iter()
            .filter(move |entity| entity.platform() == platform)
    }

    /// Outlet targets that get a switch, master last when present.
    pub fn switch_targets(&self) -> impl Iterator<Item = (OutletTarget, &str)> {
        self.entities.iter().filter_map(|entity| match entity {
            EntityDescriptor::Switch { target, name, .. } => Some((*target, name.as_str())),
            _ => None,
        })
    }
}

// ── Planning ────────────────────────────────────────────────────────

/// Plan the entities for one connected device.
pub fn plan_entities(
    config: &DeviceConfig,
    snapshot: &DeviceSnapshot,
    filter: &NameFilter,
) -> EntityPlan {
    let device = &snapshot.info.name;
    let serial = &snapshot.info.serial_number;
    let filtered = filter.filter(&snapshot.outlets);
    let mut entities = Vec::new();

    for shown in &filtered.shown {
        let label = outlet_label(device, shown.index, &shown.fragment);
        entities.push(EntityDescriptor::Switch {
            unique_id: format!("{serial}-switch-{}", shown.index),
            name: label.clone(),
            target: OutletTarget::Outlet(shown.index),
        });
        entities.push(EntityDescriptor::ResetButton {
            unique_id: format!("{serial}-button-reset-{}", shown.index),
            name: format!("{label} Reset"),
            target: OutletTarget::Outlet(shown.index),
        });
    }

    if filtered.include_master {
        entities.push(EntityDescriptor::Switch {
            unique_id: format!("{serial}-switch-0"),
            name: format!("{device} Master Switch"),
            target: OutletTarget::Master,
        });
    }

    let mut power_selected = false;
    for resource in &config.resources {
        match *resource {
            Resource::Sensor(kind) => {
                power_selected |= kind == SensorKind::PowerValue;
                entities.push(EntityDescriptor::Sensor {
                    unique_id: format!("{serial}-sensor-{}", kind.id()),
                    name: format!("{device} {}", kind.name()),
                    kind,
                });
            }
            Resource::Flag(kind) => entities.push(EntityDescriptor::BinarySensor {
                unique_id: format!("{serial}-binary_sensor-{}", kind.id()),
                name: format!("{device} {}", kind.name()),
                kind,
            }),
        }
    }

    EntityPlan {
        device: DeviceDescription::from(&snapshot.info),
        entities,
        energy: power_selected.then(|| EnergyIntegration::for_device(device)),
    }
}

fn outlet_label(device: &str, index: u8, fragment: &str) -> String {
    if fragment.trim().is_empty() {
        format!("{device} Outlet {index}")
    } else {
        format!("{device} {fragment}")
    }
}

// ── Outlet control ──────────────────────────────────────────────────

/// Descriptive attributes of a controlled outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutletAttributes {
    /// Raw name as reported by the device.
    pub name: String,
    pub method: Option<String>,
    pub index: u8,
}

/// The user-facing control surface for one outlet or the master.
///
/// Master and per-outlet controls are the same component; only the
/// target differs.
#[derive(Debug, Clone)]
pub struct OutletControl {
    session: DeviceSession,
    target: OutletTarget,
    name: String,
}

impl OutletControl {
    pub fn new(session: DeviceSession, target: OutletTarget, name: impl Into<String>) -> Self {
        Self {
            session,
            target,
            name: name.into(),
        }
    }

    pub fn target(&self) -> OutletTarget {
        self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &'static str {
        PLUG_ICON
    }

    pub fn unique_id(&self) -> String {
        format!(
            "{}-switch-{}",
            self.session.snapshot().info.serial_number,
            self.target.index()
        )
    }

    /// Current status from the latest snapshot.
    pub fn is_on(&self) -> Option<bool> {
        self.session
            .snapshot()
            .outlets
            .target(self.target)
            .map(|outlet| outlet.status)
    }

    pub fn attributes(&self) -> Option<OutletAttributes> {
        let snapshot = self.session.snapshot();
        snapshot
            .outlets
            .target(self.target)
            .map(|outlet| OutletAttributes {
                name: outlet.name.clone(),
                method: outlet.method.clone(),
                index: outlet.index,
            })
    }

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.session.set_outlet(self.target.index(), true).await
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.session.set_outlet(self.target.index(), false).await
    }

    /// Power-cycle the outlet.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.session.reset_outlet(self.target.index()).await
    }
}

// ── Telemetry views ─────────────────────────────────────────────────

/// A scalar reading with its display metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorView {
    pub kind: SensorKind,
    pub value: Option<f64>,
}

impl SensorView {
    pub fn read(kind: SensorKind, snapshot: &DeviceSnapshot) -> Self {
        Self {
            kind,
            value: snapshot.readings.get(kind),
        }
    }

    pub fn unit(&self) -> &'static str {
        self.kind.unit()
    }

    pub fn icon(&self) -> &'static str {
        self.kind.icon()
    }
}

/// A boolean flag as the user should see it, polarity already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagView {
    pub kind: FlagKind,
    pub is_on: Option<bool>,
}

impl FlagView {
    pub fn read(kind: FlagKind, snapshot: &DeviceSnapshot) -> Self {
        Self {
            kind,
            is_on: snapshot.flags.exposed(kind),
        }
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.kind.device_class()
    }
}
