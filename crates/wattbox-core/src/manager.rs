// ── Device manager ──
//
// Explicit registry of live device sessions. Owns the protocol
// connector, the change notifier and the poll scheduler, and wires a
// session into both when a device is added. Hosts hold a manager
// instead of reaching for process-wide state.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};

use wattbox_api::DeviceConnector;

use crate::config::DeviceConfig;
use crate::entity::{EntityPlan, OutletControl, plan_entities};
use crate::error::CoreError;
use crate::filter::NameFilter;
use crate::model::{DeviceKey, MacAddress, OutletTarget};
use crate::notifier::{ChangeNotifier, Subscription, SubscriptionHandle, Update};
use crate::scheduler::PollScheduler;
use crate::session::DeviceSession;
use crate::snapshot::DeviceSnapshot;

/// Best-effort MAC address lookup (ARP table, DHCP leases, ...).
///
/// Only decorates device identity; a `None` is never an error.
#[async_trait]
pub trait MacResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Option<MacAddress>;
}

#[derive(Clone)]
struct ManagedDevice {
    session: DeviceSession,
    config: DeviceConfig,
    filter: NameFilter,
}

/// Registry of connected devices. Cheaply cloneable.
#[derive(Clone)]
pub struct DeviceManager {
    connector: Arc<dyn DeviceConnector>,
    mac_resolver: Option<Arc<dyn MacResolver>>,
    notifier: ChangeNotifier,
    scheduler: PollScheduler,
    devices: Arc<DashMap<DeviceKey, ManagedDevice>>,
}

impl DeviceManager {
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            mac_resolver: None,
            notifier: ChangeNotifier::new(),
            scheduler: PollScheduler::new(),
            devices: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn with_mac_resolver(mut self, resolver: Arc<dyn MacResolver>) -> Self {
        self.mac_resolver = Some(resolver);
        self
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect a device, start polling it, and register it by name.
    ///
    /// A unit is registered at most once: a second name for the same serial
    /// number (or host and port, when the unit reports no serial) is a
    /// [`CoreError::DuplicateDevice`]. Connection failures propagate and
    /// leave nothing registered.
    pub async fn add_device(&self, config: DeviceConfig) -> Result<DeviceSession, CoreError> {
        let key = config.key();
        if config.host.trim().is_empty() {
            return Err(CoreError::Configuration {
                field: "host".into(),
                reason: format!("no host configured for {key}"),
            });
        }
        if config.timeout.is_zero() {
            return Err(CoreError::Configuration {
                field: "timeout".into(),
                reason: format!("timeout for {key} must be greater than zero"),
            });
        }
        if self.devices.contains_key(&key) {
            return Err(CoreError::DuplicateDevice {
                name: key.to_string(),
            });
        }

        let session = DeviceSession::connect(
            &config,
            self.connector.as_ref(),
            self.notifier.clone(),
            self.mac_resolver.as_deref(),
        )
        .await?;

        let identity = unit_identity(&session.snapshot(), &config);
        let existing = self
            .devices
            .iter()
            .find(|entry| unit_identity(&entry.session.snapshot(), &entry.config) == identity)
            .map(|entry| entry.key().to_string());
        if let Some(existing) = existing {
            warn!(device = %key, %existing, unit = %identity, "unit is already registered");
            session.close().await;
            return Err(CoreError::DuplicateDevice { name: existing });
        }

        let filter = config.name_filter();
        let inserted = match self.devices.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ManagedDevice {
                    session: session.clone(),
                    config,
                    filter,
                });
                true
            }
        };
        if !inserted {
            // Lost a race with a concurrent add under the same name.
            session.close().await;
            return Err(CoreError::DuplicateDevice {
                name: key.to_string(),
            });
        }

        self.scheduler.register(&session);
        info!(device = %key, "device added");
        Ok(session)
    }

    /// Stop polling, detach subscribers, and close the session.
    pub async fn remove_device(&self, name: &str) -> Result<(), CoreError> {
        let key = DeviceKey::new(name);
        let Some((_, device)) = self.devices.remove(&key) else {
            return Err(not_found(name));
        };
        self.scheduler.unregister(&key);
        self.notifier.remove(&key);
        device.session.close().await;
        info!(device = %key, "device removed");
        Ok(())
    }

    /// Close every device and stop all polling.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        let keys = self.device_names();
        for key in keys {
            if let Some((_, device)) = self.devices.remove(&key) {
                self.notifier.remove(&key);
                device.session.close().await;
            }
        }
        info!("device manager shut down");
    }

    // ── Lookup ───────────────────────────────────────────────────

    /// Registered device names, sorted.
    pub fn device_names(&self) -> Vec<DeviceKey> {
        let mut names: Vec<DeviceKey> = self.devices.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(&DeviceKey::new(name))
    }

    pub fn session(&self, name: &str) -> Result<DeviceSession, CoreError> {
        self.device(name).map(|device| device.session)
    }

    pub fn snapshot(&self, name: &str) -> Result<Arc<DeviceSnapshot>, CoreError> {
        self.session(name).map(|session| session.snapshot())
    }

    // ── Operations ───────────────────────────────────────────────

    /// Refresh one device, returning the snapshot the read produced.
    pub async fn refresh(&self, name: &str) -> Result<Arc<DeviceSnapshot>, CoreError> {
        self.session(name)?.refresh().await
    }

    pub async fn set_outlet(&self, name: &str, index: u8, on: bool) -> Result<(), CoreError> {
        self.session(name)?.set_outlet(index, on).await
    }

    pub async fn reset_outlet(&self, name: &str, index: u8) -> Result<(), CoreError> {
        self.session(name)?.reset_outlet(index).await
    }

    /// Refresh every device concurrently, logging failures.
    pub async fn refresh_all(&self) {
        let sessions: Vec<DeviceSession> =
            self.devices.iter().map(|e| e.session.clone()).collect();
        let mut set = tokio::task::JoinSet::new();
        for session in sessions {
            set.spawn(async move { (session.key().clone(), session.refresh().await) });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(_))) => {}
                Ok((key, Err(e))) => warn!(device = %key, error = %e, "refresh failed"),
                Err(e) => warn!(error = %e, "refresh task failed"),
            }
        }
    }

    // ── Presentation ─────────────────────────────────────────────

    /// The entity topology for a device from its current snapshot.
    pub fn entities(&self, name: &str) -> Result<EntityPlan, CoreError> {
        let device = self.device(name)?;
        Ok(plan_entities(
            &device.config,
            &device.session.snapshot(),
            &device.filter,
        ))
    }

    /// Controls for every outlet switch the device represents.
    pub fn outlet_controls(&self, name: &str) -> Result<Vec<OutletControl>, CoreError> {
        let device = self.device(name)?;
        let plan = plan_entities(&device.config, &device.session.snapshot(), &device.filter);
        Ok(plan
            .switch_targets()
            .map(|(target, label)| OutletControl::new(device.session.clone(), target, label))
            .collect())
    }

    /// Control for one outlet, whether or not it is represented.
    pub fn outlet_control(
        &self,
        name: &str,
        target: OutletTarget,
    ) -> Result<OutletControl, CoreError> {
        let session = self.session(name)?;
        let snapshot = session.snapshot();
        let Some(outlet) = snapshot.outlets.target(target) else {
            return Err(match target {
                OutletTarget::Master => CoreError::NoMasterOutlet {
                    device: name.to_owned(),
                },
                OutletTarget::Outlet(index) => CoreError::UnknownOutlet {
                    device: name.to_owned(),
                    index,
                },
            });
        };
        let label = format!("{} {}", snapshot.info.name, outlet.name);
        Ok(OutletControl::new(session, target, label))
    }

    // ── Notifications ────────────────────────────────────────────

    /// Subscribe to a registered device. The subscription ends when the
    /// device is removed.
    pub fn subscribe(&self, name: &str) -> Result<Subscription, CoreError> {
        let key = self.registered_key(name)?;
        Ok(self.notifier.subscribe(&key))
    }

    pub fn subscribe_fn<F>(&self, name: &str, callback: F) -> Result<SubscriptionHandle, CoreError>
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        let key = self.registered_key(name)?;
        Ok(self.notifier.subscribe_fn(&key, callback))
    }

    fn registered_key(&self, name: &str) -> Result<DeviceKey, CoreError> {
        let key = DeviceKey::new(name);
        if self.devices.contains_key(&key) {
            Ok(key)
        } else {
            Err(not_found(name))
        }
    }

    fn device(&self, name: &str) -> Result<ManagedDevice, CoreError> {
        self.devices
            .get(&DeviceKey::new(name))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| not_found(name))
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("devices", &self.device_names())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// What makes two registrations the same physical unit.
fn unit_identity(snapshot: &DeviceSnapshot, config: &DeviceConfig) -> String {
    let serial = snapshot.info.serial_number.trim();
    if serial.is_empty() {
        format!("{}:{}", config.host.trim(), config.port)
    } else {
        serial.to_owned()
    }
}

fn not_found(name: &str) -> CoreError {
    CoreError::DeviceNotFound {
        name: name.to_owned(),
    }
}
