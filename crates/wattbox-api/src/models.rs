// Raw device report types
//
// What a protocol client hands back from one read cycle. Fields use
// `#[serde(default)]` liberally because different WattBox firmware
// (and the two protocol families) report different subsets: UPS fields
// are absent on units without a battery, HTTP units omit cloud status, etc.

use serde::{Deserialize, Serialize};

// ── Report ───────────────────────────────────────────────────────────

/// Everything one read cycle returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub info: InfoReport,
    /// Regular outlets, 1-based. Order is not significant.
    #[serde(default)]
    pub outlets: Vec<OutletReport>,
    /// Synthetic master outlet (index 0), if the unit exposes one.
    #[serde(default)]
    pub master: Option<OutletReport>,
    #[serde(default)]
    pub status: StatusReport,
}

/// Static identity of the unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoReport {
    pub serial_number: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Hardware version string; WattBox encodes the outlet count at the end.
    #[serde(default)]
    pub hardware_version: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// One receptacle as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletReport {
    pub index: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: bool,
    /// How the outlet is driven (e.g. "manual", "schedule"). Descriptive only.
    #[serde(default)]
    pub method: Option<String>,
}

/// Telemetry and boolean flags, raw polarity.
///
/// Every field is optional: `None` means the unit did not report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    // Flags
    #[serde(default)]
    pub audible_alarm: Option<bool>,
    #[serde(default)]
    pub auto_reboot: Option<bool>,
    /// `true` means a battery problem is present.
    #[serde(default)]
    pub battery_health: Option<bool>,
    #[serde(default)]
    pub battery_test: Option<bool>,
    #[serde(default)]
    pub cloud_status: Option<bool>,
    #[serde(default)]
    pub has_ups: Option<bool>,
    #[serde(default)]
    pub mute: Option<bool>,
    #[serde(default)]
    pub power_lost: Option<bool>,
    #[serde(default)]
    pub safe_voltage_status: Option<bool>,

    // Readings
    #[serde(default)]
    pub battery_charge: Option<f64>,
    #[serde(default)]
    pub battery_load: Option<f64>,
    #[serde(default)]
    pub current_value: Option<f64>,
    #[serde(default)]
    pub est_run_time: Option<f64>,
    #[serde(default)]
    pub power_value: Option<f64>,
    #[serde(default)]
    pub voltage_value: Option<f64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_default() {
        let report: DeviceReport = serde_json::from_value(json!({
            "info": { "serial_number": "ST1234" },
            "outlets": [{ "index": 1, "name": "Modem", "status": true }]
        }))
        .unwrap();

        assert_eq!(report.info.serial_number, "ST1234");
        assert!(report.master.is_none());
        assert_eq!(report.outlets[0].method, None);
        assert_eq!(report.status.power_value, None);
    }

    #[test]
    fn status_fields_parse() {
        let status: StatusReport = serde_json::from_value(json!({
            "battery_health": true,
            "power_value": 212.5,
            "est_run_time": 41
        }))
        .unwrap();

        assert_eq!(status.battery_health, Some(true));
        assert_eq!(status.power_value, Some(212.5));
        assert_eq!(status.est_run_time, Some(41.0));
        assert_eq!(status.mute, None);
    }
}
