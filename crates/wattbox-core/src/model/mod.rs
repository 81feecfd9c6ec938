// ── Domain model ──
//
// Canonical, protocol-independent representation of a WattBox unit:
// identity, outlets and telemetry.

pub mod device;
pub mod outlet;
pub mod telemetry;

pub use device::{DeviceInfo, DeviceKey, MacAddress};
pub use outlet::{Outlet, OutletTarget};
pub use telemetry::{
    DeviceClass, FlagKind, Flags, Readings, Resource, SensorKind, UnknownResource,
};
