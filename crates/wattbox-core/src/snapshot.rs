// ── Device snapshot ──
//
// Everything known about a unit after one successful read. Snapshots are
// immutable; sessions replace them by reference, never in place.

use chrono::{DateTime, Utc};
use serde::Serialize;

use wattbox_api::{DeviceReport, Endpoint};

use crate::model::{DeviceInfo, Flags, Outlet, Readings};
use crate::registry::{LayoutError, OutletRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub info: DeviceInfo,
    pub outlets: OutletRegistry,
    pub readings: Readings,
    pub flags: Flags,
    pub refreshed_at: DateTime<Utc>,
}

impl DeviceSnapshot {
    /// Build the first snapshot of a session from its initial read.
    pub(crate) fn from_report(
        name: &str,
        endpoint: &Endpoint,
        report: &DeviceReport,
    ) -> Result<Self, LayoutError> {
        let outlets = OutletRegistry::from_reports(&report.outlets, report.master.as_ref())?;
        Ok(Self {
            info: DeviceInfo::from_report(name, endpoint, &report.info),
            outlets,
            readings: Readings::from(&report.status),
            flags: Flags::from(&report.status),
            refreshed_at: Utc::now(),
        })
    }

    /// The successor of `self` after a later read.
    ///
    /// Identity stays fixed for the session; only outlet state and
    /// telemetry move. A report whose outlet layout differs is rejected.
    pub(crate) fn refreshed(&self, report: &DeviceReport) -> Result<Self, RefreshMismatch> {
        let outlets = OutletRegistry::from_reports(&report.outlets, report.master.as_ref())?;
        if !self.outlets.same_layout(&outlets) {
            return Err(RefreshMismatch::LayoutChanged {
                expected: self.outlets.len(),
                found: outlets.len(),
            });
        }
        Ok(Self {
            info: self.info.clone(),
            outlets,
            readings: Readings::from(&report.status),
            flags: Flags::from(&report.status),
            refreshed_at: Utc::now(),
        })
    }

    /// A copy with a new outlet registry and everything else unchanged.
    pub(crate) fn with_outlets(&self, outlets: OutletRegistry) -> Self {
        Self {
            outlets,
            ..self.clone()
        }
    }

    /// Outlet by protocol index; 0 is the master.
    pub fn outlet(&self, index: u8) -> Option<&Outlet> {
        self.outlets.get(index)
    }
}

/// Why a later read could not replace the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshMismatch {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("outlet layout changed ({expected} outlets at setup, {found} now); reconnect required")]
    LayoutChanged { expected: usize, found: usize },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wattbox_api::{InfoReport, OutletReport, StatusReport};

    fn report(count: u8, power: f64) -> DeviceReport {
        DeviceReport {
            info: InfoReport {
                serial_number: "ST1234".into(),
                model: Some("WB-800-IPVM-12".into()),
                ..InfoReport::default()
            },
            outlets: (1..=count)
                .map(|index| OutletReport {
                    index,
                    name: Some(format!("Outlet {index}")),
                    status: true,
                    method: None,
                })
                .collect(),
            master: None,
            status: StatusReport {
                power_value: Some(power),
                ..StatusReport::default()
            },
        }
    }

    #[test]
    fn refresh_keeps_identity_and_replaces_telemetry() {
        let endpoint = Endpoint::new("10.0.0.2", 80);
        let first = DeviceSnapshot::from_report("Rack", &endpoint, &report(4, 120.0)).unwrap();
        let mut later = report(4, 95.5);
        later.info.serial_number = "SOMETHING-ELSE".into();

        let next = first.refreshed(&later).unwrap();
        assert_eq!(next.info.serial_number, "ST1234");
        assert_eq!(next.readings.power_value, Some(95.5));
    }

    #[test]
    fn refresh_rejects_changed_outlet_count() {
        let endpoint = Endpoint::new("10.0.0.2", 80);
        let first = DeviceSnapshot::from_report("Rack", &endpoint, &report(4, 1.0)).unwrap();
        let err = first.refreshed(&report(6, 1.0)).unwrap_err();
        assert_eq!(
            err,
            RefreshMismatch::LayoutChanged {
                expected: 4,
                found: 6
            }
        );
    }
}
