// Scripted in-memory WattBox shared by the integration suites.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use wattbox_api::{
    Credentials, DeviceClient, DeviceConnector, DeviceReport, Endpoint, Error, InfoReport,
    OutletReport, StatusReport, TransportKind,
};
use wattbox_core::DeviceConfig;

/// One call the device received, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Refresh,
    Set(u8, bool),
    Reset(u8),
}

#[derive(Debug)]
struct State {
    serial: String,
    outlets: Vec<(String, bool)>,
    master: Option<bool>,
    power: f64,
    calls: Vec<Call>,
    completed: Vec<Call>,
    connects: Vec<TransportKind>,
    fail_refresh: bool,
    fail_commands: bool,
    reject_auth: bool,
    unreachable: bool,
    delay: Duration,
    in_flight: usize,
    max_in_flight: usize,
}

/// Handle to the fake device; clones share state.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    state: Arc<Mutex<State>>,
}

impl FakeDevice {
    pub fn new(names: &[&str], master: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                serial: "ST1234".into(),
                outlets: names.iter().map(|n| ((*n).to_owned(), true)).collect(),
                master: master.then_some(true),
                power: 120.0,
                calls: Vec::new(),
                completed: Vec::new(),
                connects: Vec::new(),
                fail_refresh: false,
                fail_commands: false,
                reject_auth: false,
                unreachable: false,
                delay: Duration::ZERO,
                in_flight: 0,
                max_in_flight: 0,
            })),
        }
    }

    /// The four-outlet unit used throughout the suites.
    pub fn rack() -> Self {
        Self::new(&["Modem 1", "Router Uplink", "Switch", "NAS"], true)
    }

    pub fn connector(&self) -> Arc<FakeConnector> {
        Arc::new(FakeConnector {
            device: self.clone(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls whose device-side work finished, in completion order.
    pub fn completed(&self) -> Vec<Call> {
        self.state.lock().unwrap().completed.clone()
    }

    /// Most device calls ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn refresh_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Refresh).count()
    }

    pub fn connects(&self) -> Vec<TransportKind> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.completed.clear();
    }

    pub fn outlet_status(&self, index: u8) -> bool {
        let state = self.state.lock().unwrap();
        state.outlets[usize::from(index) - 1].1
    }

    /// Serial reported by later reads, as if another unit answered.
    pub fn set_serial(&self, serial: &str) {
        self.state.lock().unwrap().serial = serial.to_owned();
    }

    pub fn set_power(&self, watts: f64) {
        self.state.lock().unwrap().power = watts;
    }

    /// Flip an outlet behind the session's back, as a front-panel press would.
    pub fn press(&self, index: u8, on: bool) {
        self.state.lock().unwrap().outlets[usize::from(index) - 1].1 = on;
    }

    pub fn add_outlet(&self, name: &str) {
        self.state.lock().unwrap().outlets.push((name.to_owned(), true));
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.state.lock().unwrap().fail_refresh = fail;
    }

    pub fn fail_commands(&self, fail: bool) {
        self.state.lock().unwrap().fail_commands = fail;
    }

    pub fn reject_auth(&self, reject: bool) {
        self.state.lock().unwrap().reject_auth = reject;
    }

    pub fn unreachable(&self, down: bool) {
        self.state.lock().unwrap().unreachable = down;
    }

    /// How long every device call takes.
    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    fn report(&self) -> DeviceReport {
        let state = self.state.lock().unwrap();
        DeviceReport {
            info: InfoReport {
                serial_number: state.serial.clone(),
                model: Some("WB-800-IPVM-12".into()),
                firmware_version: Some("2.4.0.1".into()),
                hardware_version: Some("WB-800-IPVM-12".into()),
                hostname: Some("rack-pdu".into()),
            },
            outlets: state
                .outlets
                .iter()
                .zip(1u8..)
                .map(|((name, status), index)| OutletReport {
                    index,
                    name: Some(name.clone()),
                    status: *status,
                    method: Some("manual".into()),
                })
                .collect(),
            master: state.master.map(|status| OutletReport {
                index: 0,
                name: Some("Master".into()),
                status,
                method: None,
            }),
            status: StatusReport {
                power_value: Some(state.power),
                voltage_value: Some(121.3),
                battery_health: Some(false),
                power_lost: Some(false),
                ..StatusReport::default()
            },
        }
    }

    async fn begin(&self, call: Call) -> Result<(), Error> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        state.completed.push(call);
        let failing = match call {
            Call::Refresh => state.fail_refresh,
            Call::Set(..) | Call::Reset(_) => state.fail_commands,
        };
        if failing {
            return Err(Error::Protocol {
                message: "device did not acknowledge".into(),
            });
        }
        Ok(())
    }
}

pub struct FakeConnector {
    device: FakeDevice,
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    async fn connect(
        &self,
        kind: TransportKind,
        endpoint: &Endpoint,
        _credentials: &Credentials,
    ) -> Result<Box<dyn DeviceClient>, Error> {
        let mut state = self.device.state.lock().unwrap();
        state.connects.push(kind);
        if state.unreachable {
            return Err(Error::Unreachable {
                host: endpoint.host.clone(),
                port: endpoint.port,
                reason: "connection refused".into(),
            });
        }
        if state.reject_auth {
            return Err(Error::Authentication {
                message: "invalid credentials".into(),
            });
        }
        Ok(Box::new(FakeClient {
            device: self.device.clone(),
        }))
    }
}

struct FakeClient {
    device: FakeDevice,
}

#[async_trait]
impl DeviceClient for FakeClient {
    async fn refresh(&mut self) -> Result<DeviceReport, Error> {
        self.device.begin(Call::Refresh).await?;
        Ok(self.device.report())
    }

    async fn set_outlet(&mut self, index: u8, on: bool) -> Result<(), Error> {
        self.device.begin(Call::Set(index, on)).await?;
        let mut state = self.device.state.lock().unwrap();
        if index == 0 {
            state.master = Some(on);
            for outlet in &mut state.outlets {
                outlet.1 = on;
            }
        } else {
            state.outlets[usize::from(index) - 1].1 = on;
        }
        Ok(())
    }

    async fn reset_outlet(&mut self, index: u8) -> Result<(), Error> {
        self.device.begin(Call::Reset(index)).await
    }
}

pub fn config(name: &str) -> DeviceConfig {
    DeviceConfig::new(name, "10.0.0.2")
}
