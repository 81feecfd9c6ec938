//! Session management, polling and entity planning for WattBox PDUs.
//!
//! This crate owns the business logic between the `wattbox-api` protocol
//! seam and whatever host renders the devices:
//!
//! - **[`DeviceSession`]**: One live connection per device, owned by a
//!   single worker task. Refreshes and outlet commands queue FIFO behind
//!   each other; readers get lock-free [`DeviceSnapshot`]s.
//!
//! - **[`PollScheduler`]**: One periodic refresh task per device. The
//!   first refresh fires immediately; failures never stop the schedule.
//!
//! - **[`ChangeNotifier`]**: Per-device broadcast topics. Subscribe with a
//!   receiver ([`Subscription`]) or a callback ([`SubscriptionHandle`]).
//!
//! - **[`DeviceManager`]**: Explicit registry tying the above together,
//!   keyed by [`DeviceKey`].
//!
//! - **Presentation** ([`entity`]): [`NameFilter`] rules, the
//!   [`EntityPlan`] a host should create, and [`OutletControl`], the single
//!   control component for both regular outlets and the master.

pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod manager;
pub mod model;
pub mod notifier;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod snapshot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::DeviceConfig;
pub use entity::{
    DeviceDescription, EnergyIntegration, EntityDescriptor, EntityPlan, FlagView,
    OutletAttributes, OutletControl, Platform, SensorView, plan_entities,
};
pub use error::CoreError;
pub use filter::{Disposition, FilteredOutlets, NameFilter};
pub use manager::{DeviceManager, MacResolver};
pub use notifier::{ChangeNotifier, Subscription, SubscriptionHandle, Update, UpdateKind};
pub use registry::{LayoutError, OutletRegistry};
pub use scheduler::PollScheduler;
pub use session::DeviceSession;
pub use snapshot::DeviceSnapshot;

pub use model::{
    DeviceClass, DeviceInfo, DeviceKey, FlagKind, Flags, MacAddress, Outlet, OutletTarget,
    Readings, Resource, SensorKind, UnknownResource,
};
