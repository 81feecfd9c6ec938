// ── Core error types ──
//
// Session-level errors from wattbox-core. Consumers never see raw
// protocol failures directly: the constructors below translate a
// `wattbox_api::Error` into the variant that matches where it happened
// (session establishment, a read cycle, or an outlet command).

use std::fmt::Display;

use thiserror::Error;

use crate::model::OutletTarget;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session establishment ────────────────────────────────────────
    /// Device unreachable or unusable at setup. Not permanent: the host
    /// should treat the device as "not ready" and retry setup later.
    #[error("Cannot connect to {device}: {reason}")]
    Connection { device: String, reason: String },

    #[error("Authentication failed for {device}: {message}")]
    AuthenticationFailed { device: String, message: String },

    // ── Operations ───────────────────────────────────────────────────
    /// A read cycle failed. The previous snapshot is still current.
    #[error("Refresh of {device} failed: {reason}")]
    Refresh { device: String, reason: String },

    /// An outlet command failed. Any optimistic state already applied stays.
    #[error("Command to {target} on {device} failed: {reason}")]
    Control {
        device: String,
        target: OutletTarget,
        reason: String,
    },

    #[error("{device} has no outlet {index}")]
    UnknownOutlet { device: String, index: u8 },

    #[error("{device} has no master outlet")]
    NoMasterOutlet { device: String },

    #[error("Session for {device} is closed")]
    SessionClosed { device: String },

    // ── Registry ─────────────────────────────────────────────────────
    #[error("Device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("Device already registered: {name}")]
    DuplicateDevice { name: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error in {field}: {reason}")]
    Configuration { field: String, reason: String },
}

impl CoreError {
    /// Translate a protocol failure during session establishment.
    pub(crate) fn connection(device: impl Display, err: &wattbox_api::Error) -> Self {
        if err.is_auth_failure() {
            Self::AuthenticationFailed {
                device: device.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Connection {
                device: device.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub(crate) fn refresh(device: impl Display, reason: impl Display) -> Self {
        Self::Refresh {
            device: device.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn control(device: impl Display, target: OutletTarget, reason: impl Display) -> Self {
        Self::Control {
            device: device.to_string(),
            target,
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Refresh { .. } | Self::Control { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejection_maps_to_authentication_failed() {
        let err = CoreError::connection(
            "Rack",
            &wattbox_api::Error::Authentication {
                message: "bad password".into(),
            },
        );
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unreachable_maps_to_connection() {
        let err = CoreError::connection(
            "Rack",
            &wattbox_api::Error::Unreachable {
                host: "10.0.0.9".into(),
                port: 23,
                reason: "no route to host".into(),
            },
        );
        assert!(matches!(err, CoreError::Connection { .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("Cannot connect to Rack"));
    }

    #[test]
    fn control_error_names_target() {
        let err = CoreError::control("Rack", OutletTarget::Outlet(2), "timed out");
        assert_eq!(err.to_string(), "Command to outlet 2 on Rack failed: timed out");
    }
}
