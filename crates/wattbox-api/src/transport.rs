// Transport selection and connection parameters.
//
// WattBox units speak two protocol families: a session-oriented
// line protocol over SSH or telnet, and a request/response HTTP API.
// The family is chosen purely from the configured port.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Default HTTP port for WattBox units.
pub const DEFAULT_PORT: u16 = 80;
/// Default username and password printed on WattBox units.
pub const DEFAULT_USER: &str = "wattbox";
pub const DEFAULT_PASSWORD: &str = "wattbox";

/// Which protocol family a client must speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Session-oriented line protocol over SSH (port 22).
    Ssh,
    /// Session-oriented line protocol over telnet (port 23).
    Telnet,
    /// Request/response HTTP API (every other port).
    Http,
}

impl TransportKind {
    /// Pick the transport for a port: 22 and 23 select the session
    /// family, everything else selects HTTP.
    pub fn for_port(port: u16) -> Self {
        match port {
            22 => Self::Ssh,
            23 => Self::Telnet,
            _ => Self::Http,
        }
    }

    /// Whether this transport keeps a long-lived interactive session.
    pub fn is_session(self) -> bool {
        matches!(self, Self::Ssh | Self::Telnet)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ssh => "ssh",
            Self::Telnet => "telnet",
            Self::Http => "http",
        };
        f.write_str(name)
    }
}

/// Where a device lives and how long to wait on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> TransportKind {
        TransportKind::for_port(self.port)
    }

    /// Browser URL for the device's own web UI, for descriptive display.
    ///
    /// Returns `None` when the host cannot form a valid URL.
    pub fn configuration_url(&self) -> Option<Url> {
        Url::parse(&format!("http://{}:{}", self.host, self.port)).ok()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Login credentials for a device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USER, DEFAULT_PASSWORD)
    }
}
