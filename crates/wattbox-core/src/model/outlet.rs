// ── Outlet domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};

use wattbox_api::{MASTER_INDEX, OutletReport};

/// One receptacle, or the synthetic master (index 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlet {
    pub index: u8,
    /// Name as reported by the device; may be empty.
    pub name: String,
    pub status: bool,
    /// Control method ("manual", "schedule", ...). Descriptive only.
    pub method: Option<String>,
}

impl Outlet {
    pub fn is_master(&self) -> bool {
        self.index == MASTER_INDEX
    }
}

impl From<&OutletReport> for Outlet {
    fn from(r: &OutletReport) -> Self {
        Self {
            index: r.index,
            name: r.name.clone().unwrap_or_default(),
            status: r.status,
            method: r.method.clone(),
        }
    }
}

/// Which outlet a control acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutletTarget {
    Master,
    Outlet(u8),
}

impl OutletTarget {
    /// Map a protocol index (0 = master) to a target.
    pub fn from_index(index: u8) -> Self {
        if index == MASTER_INDEX {
            Self::Master
        } else {
            Self::Outlet(index)
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Master => MASTER_INDEX,
            Self::Outlet(i) => i,
        }
    }
}

impl fmt::Display for OutletTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Outlet(i) => write!(f, "outlet {i}"),
        }
    }
}
