// ── Device session ──
//
// One live connection to one WattBox, owned by a single worker task.
// Every device operation travels through the worker's FIFO queue, so a
// refresh and an outlet command for the same device never interleave
// and always run in submission order. Readers take lock-free snapshots.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wattbox_api::{DeviceClient, DeviceConnector};

use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::manager::MacResolver;
use crate::model::{DeviceKey, OutletTarget};
use crate::notifier::{ChangeNotifier, UpdateKind};
use crate::snapshot::DeviceSnapshot;

const OPERATION_QUEUE_SIZE: usize = 32;

// ── Operations ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Operation {
    Refresh,
    SetOutlet { target: OutletTarget, on: bool },
    ResetOutlet { target: OutletTarget },
}

/// Every operation replies with the snapshot current once it finished.
type Reply = Result<Arc<DeviceSnapshot>, CoreError>;

struct OperationEnvelope {
    operation: Operation,
    response_tx: oneshot::Sender<Reply>,
}

// ── DeviceSession ───────────────────────────────────────────────────

/// Handle to a connected device.
///
/// Cheaply cloneable. The worker stops when [`close`](Self::close) is
/// called or when the last handle is dropped.
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    shared: Arc<Shared>,
    scan_interval: Duration,
    command_tx: mpsc::Sender<OperationEnvelope>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// State the worker and handles both see.
struct Shared {
    key: DeviceKey,
    snapshot: ArcSwap<DeviceSnapshot>,
    notifier: ChangeNotifier,
    cancel: CancellationToken,
    timeout: Duration,
}

impl DeviceSession {
    /// Connect, read the device once, and start the worker.
    ///
    /// The first read fixes the device's identity and outlet range for the
    /// lifetime of the session. Failures leave nothing running and are
    /// worth retrying later.
    pub async fn connect(
        config: &DeviceConfig,
        connector: &dyn DeviceConnector,
        notifier: ChangeNotifier,
        mac_resolver: Option<&dyn MacResolver>,
    ) -> Result<Self, CoreError> {
        let key = config.key();
        let endpoint = config.endpoint();
        info!(device = %key, %endpoint, transport = %endpoint.transport(), "connecting");

        let mut client = bounded(
            config.timeout,
            wattbox_api::connect(connector, &endpoint, &config.credentials),
        )
        .await
        .map_err(|e| CoreError::connection(&key, &e))?;

        let report = match bounded(config.timeout, client.refresh()).await {
            Ok(report) => report,
            Err(e) => {
                close_client(&key, client.as_mut(), config.timeout).await;
                return Err(CoreError::connection(&key, &e));
            }
        };

        let mut snapshot = match DeviceSnapshot::from_report(&config.name, &endpoint, &report) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                close_client(&key, client.as_mut(), config.timeout).await;
                return Err(CoreError::Connection {
                    device: key.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        if let Some(resolver) = mac_resolver {
            // Best-effort: a missing MAC never blocks setup.
            match tokio::time::timeout(config.timeout, resolver.resolve(&config.host)).await {
                Ok(Some(mac)) => snapshot.info.mac = Some(mac),
                Ok(None) => debug!(device = %key, "no MAC address found"),
                Err(_) => debug!(device = %key, "MAC lookup timed out"),
            }
        }

        info!(
            device = %key,
            serial = %snapshot.info.serial_number,
            outlets = snapshot.outlets.len(),
            master = snapshot.outlets.has_master(),
            "connected"
        );

        let shared = Arc::new(Shared {
            key,
            snapshot: ArcSwap::from_pointee(snapshot),
            notifier,
            cancel: CancellationToken::new(),
            timeout: config.timeout,
        });

        let (command_tx, command_rx) = mpsc::channel(OPERATION_QUEUE_SIZE);
        let worker = tokio::spawn(operation_worker(Arc::clone(&shared), client, command_rx));

        Ok(Self {
            inner: Arc::new(SessionInner {
                shared,
                scan_interval: config.scan_interval,
                command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub fn key(&self) -> &DeviceKey {
        &self.inner.shared.key
    }

    pub fn scan_interval(&self) -> Duration {
        self.inner.scan_interval
    }

    /// The current snapshot. Never blocks, never observes a partial update.
    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.inner.shared.snapshot.load_full()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shared.cancel.is_cancelled()
    }

    // ── Operations ───────────────────────────────────────────────

    /// Read the device once and replace the snapshot.
    ///
    /// Returns the snapshot this read produced. On failure the previous
    /// snapshot stays current.
    pub async fn refresh(&self) -> Result<Arc<DeviceSnapshot>, CoreError> {
        self.submit(Operation::Refresh).await
    }

    /// Switch an outlet. Index 0 is the master outlet.
    ///
    /// The snapshot shows the desired status before the device confirms.
    /// Every call sends a command, even if the outlet is already in the
    /// desired state. A failed command is not rolled back.
    pub async fn set_outlet(&self, index: u8, on: bool) -> Result<(), CoreError> {
        let target = self.validate(index)?;
        self.submit(Operation::SetOutlet { target, on })
            .await
            .map(|_| ())
    }

    /// Power-cycle an outlet. The cached status is left to the next refresh.
    pub async fn reset_outlet(&self, index: u8) -> Result<(), CoreError> {
        let target = self.validate(index)?;
        self.submit(Operation::ResetOutlet { target })
            .await
            .map(|_| ())
    }

    /// Stop the worker and disconnect.
    ///
    /// An operation already talking to the device finishes, but its result
    /// is discarded. Queued and later operations fail with
    /// [`CoreError::SessionClosed`]. Idempotent.
    pub async fn close(&self) {
        self.inner.shared.cancel.cancel();
        let worker = self.inner.worker.lock().await.take();
        if let Some(handle) = worker {
            let _ = handle.await;
        }
    }

    // ── Internals ────────────────────────────────────────────────

    fn validate(&self, index: u8) -> Result<OutletTarget, CoreError> {
        let target = OutletTarget::from_index(index);
        let snapshot = self.inner.shared.snapshot.load();
        if snapshot.outlets.target(target).is_some() {
            return Ok(target);
        }
        let device = self.key().to_string();
        Err(match target {
            OutletTarget::Master => CoreError::NoMasterOutlet { device },
            OutletTarget::Outlet(index) => CoreError::UnknownOutlet { device, index },
        })
    }

    async fn submit(&self, operation: Operation) -> Reply {
        let closed = || CoreError::SessionClosed {
            device: self.key().to_string(),
        };
        if self.is_closed() {
            return Err(closed());
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(OperationEnvelope {
                operation,
                response_tx: tx,
            })
            .await
            .map_err(|_| closed())?;

        rx.await.map_err(|_| closed())?
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device", self.key())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ── Worker ──────────────────────────────────────────────────────────

/// Drain the operation queue one entry at a time until cancelled.
async fn operation_worker(
    shared: Arc<Shared>,
    mut client: Box<dyn DeviceClient>,
    mut rx: mpsc::Receiver<OperationEnvelope>,
) {
    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = run_operation(&shared, client.as_mut(), envelope.operation).await;
                let result = if shared.cancel.is_cancelled() {
                    debug!(device = %shared.key, "discarding result of operation finished after close");
                    Err(CoreError::SessionClosed { device: shared.key.to_string() })
                } else {
                    result
                };
                let _ = envelope.response_tx.send(result);
            }
        }
    }

    rx.close();
    while let Ok(envelope) = rx.try_recv() {
        let _ = envelope.response_tx.send(Err(CoreError::SessionClosed {
            device: shared.key.to_string(),
        }));
    }

    close_client(&shared.key, client.as_mut(), shared.timeout).await;
    info!(device = %shared.key, "session closed");
}

async fn run_operation(
    shared: &Shared,
    client: &mut dyn DeviceClient,
    operation: Operation,
) -> Reply {
    match operation {
        Operation::Refresh => refresh(shared, client).await,
        Operation::SetOutlet { target, on } => set_outlet(shared, client, target, on).await,
        Operation::ResetOutlet { target } => reset_outlet(shared, client, target).await,
    }
}

async fn refresh(shared: &Shared, client: &mut dyn DeviceClient) -> Reply {
    debug!(device = %shared.key, "refreshing");
    let report = match bounded(shared.timeout, client.refresh()).await {
        Ok(report) => report,
        Err(e) => {
            warn!(device = %shared.key, error = %e, "refresh failed, keeping previous state");
            return Err(CoreError::refresh(&shared.key, e));
        }
    };

    if shared.cancel.is_cancelled() {
        return Ok(shared.snapshot.load_full());
    }

    let next = match shared.snapshot.load().refreshed(&report) {
        Ok(next) => next,
        Err(e) => {
            warn!(device = %shared.key, error = %e, "refresh rejected, keeping previous state");
            return Err(CoreError::refresh(&shared.key, e));
        }
    };
    let next = Arc::new(next);
    shared.snapshot.store(Arc::clone(&next));
    shared.notifier.publish(&shared.key, UpdateKind::Refreshed);
    Ok(next)
}

async fn set_outlet(
    shared: &Shared,
    client: &mut dyn DeviceClient,
    target: OutletTarget,
    on: bool,
) -> Reply {
    let current = shared.snapshot.load_full();
    if let Some(outlets) = current.outlets.with_status(target, on) {
        shared.snapshot.store(Arc::new(current.with_outlets(outlets)));
    }
    shared
        .notifier
        .publish(&shared.key, UpdateKind::Control { target, on });

    debug!(device = %shared.key, outlet = target.index(), on, "sending outlet command");
    bounded(shared.timeout, client.set_outlet(target.index(), on))
        .await
        .map_err(|e| {
            warn!(device = %shared.key, %target, on, error = %e, "outlet command failed");
            CoreError::control(&shared.key, target, e)
        })?;
    Ok(shared.snapshot.load_full())
}

async fn reset_outlet(
    shared: &Shared,
    client: &mut dyn DeviceClient,
    target: OutletTarget,
) -> Reply {
    debug!(device = %shared.key, outlet = target.index(), "sending reset command");
    bounded(shared.timeout, client.reset_outlet(target.index()))
        .await
        .map_err(|e| {
            warn!(device = %shared.key, %target, error = %e, "reset command failed");
            CoreError::control(&shared.key, target, e)
        })?;
    shared
        .notifier
        .publish(&shared.key, UpdateKind::Reset { target });
    Ok(shared.snapshot.load_full())
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Bound one device call, turning an elapsed deadline into a protocol timeout.
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, wattbox_api::Error>>,
) -> Result<T, wattbox_api::Error> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(wattbox_api::Error::Timeout { timeout: limit }))
}

async fn close_client(key: &DeviceKey, client: &mut dyn DeviceClient, limit: Duration) {
    if let Err(e) = bounded(limit, client.close()).await {
        debug!(device = %key, error = %e, "error closing device connection");
    }
}
