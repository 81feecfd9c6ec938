#![allow(clippy::unwrap_used)]
// Transport selection through `wattbox_api::connect`.

use std::sync::Mutex;

use async_trait::async_trait;

use wattbox_api::{
    Credentials, DeviceClient, DeviceConnector, DeviceReport, Endpoint, Error, TransportKind,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct NullClient;

#[async_trait]
impl DeviceClient for NullClient {
    async fn refresh(&mut self) -> Result<DeviceReport, Error> {
        Ok(DeviceReport::default())
    }

    async fn set_outlet(&mut self, _index: u8, _on: bool) -> Result<(), Error> {
        Ok(())
    }

    async fn reset_outlet(&mut self, _index: u8) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingConnector {
    seen: Mutex<Vec<TransportKind>>,
    reject_auth: bool,
}

#[async_trait]
impl DeviceConnector for RecordingConnector {
    async fn connect(
        &self,
        kind: TransportKind,
        _endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceClient>, Error> {
        self.seen.lock().unwrap().push(kind);
        if self.reject_auth {
            return Err(Error::Authentication {
                message: format!("user {} rejected", credentials.username),
            });
        }
        Ok(Box::new(NullClient))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_port_selects_transport() {
    let connector = RecordingConnector::default();
    let creds = Credentials::default();

    for port in [22, 23, 80, 8080] {
        wattbox_api::connect(&connector, &Endpoint::new("pdu.local", port), &creds)
            .await
            .unwrap();
    }

    assert_eq!(
        *connector.seen.lock().unwrap(),
        vec![
            TransportKind::Ssh,
            TransportKind::Telnet,
            TransportKind::Http,
            TransportKind::Http,
        ]
    );
}

#[tokio::test]
async fn test_auth_rejection_surfaces() {
    let connector = RecordingConnector {
        reject_auth: true,
        ..RecordingConnector::default()
    };

    let result = wattbox_api::connect(
        &connector,
        &Endpoint::new("pdu.local", 80),
        &Credentials::new("admin", "nope"),
    )
    .await;

    match result {
        Err(err) => assert!(err.is_auth_failure(), "unexpected error: {err}"),
        Ok(_) => panic!("expected authentication failure"),
    }
}

#[tokio::test]
async fn test_default_close_is_ok() {
    let mut client = NullClient;
    client.close().await.unwrap();
}
