use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `wattbox-api` crate.
///
/// Covers every failure mode a protocol client can report:
/// authentication, reachability, timeouts, and device-side rejections.
/// `wattbox-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The device rejected the supplied username/password.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Host could not be reached (DNS failure, refused, no route).
    #[error("Cannot reach {host}:{port}: {reason}")]
    Unreachable {
        host: String,
        port: u16,
        reason: String,
    },

    /// Request timed out.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The connection was closed by the peer or by `close()`.
    #[error("Connection closed")]
    Closed,

    // ── Device ──────────────────────────────────────────────────────
    /// The device answered, but not in a way the client understood.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The device has no outlet at this index.
    #[error("Unknown outlet index {index}")]
    UnknownOutlet { index: u8 },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::Closed
        )
    }

    /// Returns `true` if the device rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_unreachable_are_transient() {
        assert!(
            Error::Timeout {
                timeout: Duration::from_secs(5)
            }
            .is_transient()
        );
        assert!(
            Error::Unreachable {
                host: "10.0.0.5".into(),
                port: 80,
                reason: "connection refused".into(),
            }
            .is_transient()
        );
        assert!(!Error::UnknownOutlet { index: 9 }.is_transient());
    }

    #[test]
    fn auth_failure_is_not_transient() {
        let err = Error::Authentication {
            message: "bad password".into(),
        };
        assert!(err.is_auth_failure());
        assert!(!err.is_transient());
    }

    #[test]
    fn timeout_message_keeps_sub_second_precision() {
        let err = Error::Timeout {
            timeout: Duration::from_millis(500),
        };
        assert_eq!(err.to_string(), "Request timed out after 500ms");
    }
}
