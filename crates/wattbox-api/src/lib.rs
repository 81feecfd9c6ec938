// wattbox-api: Protocol seam for WattBox power-distribution units.
//
// Defines what a protocol client must provide (connect, read, outlet
// commands) and the raw shapes it reports. The SSH/telnet and HTTP
// dialects themselves are implemented by whoever provides a
// `DeviceConnector`.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{DeviceClient, DeviceConnector, MASTER_INDEX, connect};
pub use error::Error;
pub use models::{DeviceReport, InfoReport, OutletReport, StatusReport};
pub use transport::{
    Credentials, DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_USER, Endpoint, TransportKind,
};
