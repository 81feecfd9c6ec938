// ── Outlet registry ──
//
// Immutable per-device outlet table. Regular outlets are keyed 1..=N
// with no gaps; the master outlet is addressable as index 0 but never
// appears when iterating. Status changes produce a new registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wattbox_api::{MASTER_INDEX, OutletReport};

use crate::model::{Outlet, OutletTarget};

/// Why a reported outlet list cannot form a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("outlet index 0 is reserved for the master outlet")]
    ReservedIndex,

    #[error("outlet {0} reported more than once")]
    Duplicate(u8),

    #[error("outlet indices must run 1..={count} without gaps, missing {missing}")]
    Gap { count: usize, missing: usize },
}

/// Snapshot of outlet state for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletRegistry {
    outlets: BTreeMap<u8, Outlet>,
    master: Option<Outlet>,
}

impl OutletRegistry {
    /// Build a registry from a device report, validating the index range.
    pub fn from_reports(
        outlets: &[OutletReport],
        master: Option<&OutletReport>,
    ) -> Result<Self, LayoutError> {
        let mut map = BTreeMap::new();
        for report in outlets {
            if report.index == MASTER_INDEX {
                return Err(LayoutError::ReservedIndex);
            }
            if map.insert(report.index, Outlet::from(report)).is_some() {
                return Err(LayoutError::Duplicate(report.index));
            }
        }

        // BTreeMap keys are sorted and unique, so the range is contiguous
        // exactly when the n-th key is n.
        if let Some(missing) = (1..=map.len()).zip(map.keys()).find_map(|(expected, &actual)| {
            (usize::from(actual) != expected).then_some(expected)
        }) {
            return Err(LayoutError::Gap {
                count: map.len(),
                missing,
            });
        }

        let master = master.map(|report| Outlet {
            index: MASTER_INDEX,
            ..Outlet::from(report)
        });

        Ok(Self {
            outlets: map,
            master,
        })
    }

    /// Look up by protocol index; 0 is the master outlet.
    pub fn get(&self, index: u8) -> Option<&Outlet> {
        if index == MASTER_INDEX {
            self.master.as_ref()
        } else {
            self.outlets.get(&index)
        }
    }

    pub fn target(&self, target: OutletTarget) -> Option<&Outlet> {
        self.get(target.index())
    }

    pub fn master(&self) -> Option<&Outlet> {
        self.master.as_ref()
    }

    pub fn has_master(&self) -> bool {
        self.master.is_some()
    }

    /// Regular outlets in index order. The master is never included.
    pub fn iter(&self) -> impl Iterator<Item = &Outlet> {
        self.outlets.values()
    }

    /// Number of regular outlets.
    pub fn len(&self) -> usize {
        self.outlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlets.is_empty()
    }

    /// Whether `other` has the same outlets (and master presence) as `self`.
    pub fn same_layout(&self, other: &Self) -> bool {
        self.has_master() == other.has_master() && self.outlets.keys().eq(other.outlets.keys())
    }

    /// A copy with one outlet's status changed.
    ///
    /// Targeting the master switches every outlet along with it.
    /// Returns `None` if the target does not exist.
    pub fn with_status(&self, target: OutletTarget, on: bool) -> Option<Self> {
        match target {
            OutletTarget::Master => {
                self.master.as_ref()?;
                Some(self.with_all_status(on))
            }
            OutletTarget::Outlet(index) => {
                let mut next = self.clone();
                next.outlets.get_mut(&index)?.status = on;
                Some(next)
            }
        }
    }

    /// A copy with every outlet, master included, set to `on`.
    pub fn with_all_status(&self, on: bool) -> Self {
        let mut next = self.clone();
        if let Some(master) = next.master.as_mut() {
            master.status = on;
        }
        for outlet in next.outlets.values_mut() {
            outlet.status = on;
        }
        next
    }
}

impl<'a> IntoIterator for &'a OutletRegistry {
    type Item = &'a Outlet;
    type IntoIter = std::collections::btree_map::Values<'a, u8, Outlet>;

    fn into_iter(self) -> Self::IntoIter {
        self.outlets.values()
    }
}
