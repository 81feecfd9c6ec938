// Protocol client traits
//
// The wire protocol itself lives behind these traits. A connector turns
// an endpoint + credentials into a live client for one transport family;
// the client performs reads and outlet commands over that connection.
// Callers own the client exclusively, so methods take `&mut self`.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Error;
use crate::models::DeviceReport;
use crate::transport::{Credentials, Endpoint, TransportKind};

/// Index that addresses the synthetic master outlet.
pub const MASTER_INDEX: u8 = 0;

/// A live connection to one WattBox unit.
#[async_trait]
pub trait DeviceClient: Send {
    /// Perform one read cycle: identity, outlets, flags and readings.
    async fn refresh(&mut self) -> Result<DeviceReport, Error>;

    /// Switch an outlet on or off. Index 0 addresses the master outlet.
    async fn set_outlet(&mut self, index: u8, on: bool) -> Result<(), Error>;

    /// Power-cycle an outlet.
    async fn reset_outlet(&mut self, index: u8) -> Result<(), Error>;

    /// Tear down the connection. Further calls should fail with [`Error::Closed`].
    async fn close(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Establishes connections for a given transport family.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect(
        &self,
        kind: TransportKind,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceClient>, Error>;
}

/// Connect to `endpoint`, selecting the transport family from its port.
pub async fn connect(
    connector: &dyn DeviceConnector,
    endpoint: &Endpoint,
    credentials: &Credentials,
) -> Result<Box<dyn DeviceClient>, Error> {
    let kind = endpoint.transport();
    debug!(%endpoint, transport = %kind, "creating WattBox client");
    connector.connect(kind, endpoint, credentials).await
}
