// ── Poll scheduler ──
//
// One periodic refresh task per device. Devices poll independently of
// each other; a failed read is logged by the session and the schedule
// simply continues.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::model::DeviceKey;
use crate::session::DeviceSession;

type TaskMap = Arc<DashMap<DeviceKey, PollTask>>;

struct PollTask {
    /// Distinguishes this task from a later one registered under the same key.
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the periodic refresh tasks. Cheaply cloneable.
///
/// A task whose session closes drops its own registration.
#[derive(Clone, Default)]
pub struct PollScheduler {
    tasks: TaskMap,
    generations: Arc<AtomicU64>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `session` at its scan interval.
    ///
    /// The first refresh fires immediately. Registering a device that is
    /// already scheduled replaces its task. A zero interval disables polling.
    pub fn register(&self, session: &DeviceSession) {
        let key = session.key().clone();
        let period = session.scan_interval();
        if period.is_zero() {
            debug!(device = %key, "scan interval is zero, polling disabled");
            self.unregister(&key);
            return;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (armed_tx, armed_rx) = oneshot::channel();
        let handle = tokio::spawn(poll_task(
            session.clone(),
            period,
            cancel.clone(),
            Registration {
                tasks: Arc::clone(&self.tasks),
                generation,
                armed: armed_rx,
            },
        ));
        let task = PollTask {
            generation,
            cancel,
            handle,
        };
        if let Some(previous) = self.tasks.insert(key.clone(), task) {
            previous.cancel.cancel();
        }
        // The task may only clean up after its entry exists.
        let _ = armed_tx.send(());
        debug!(device = %key, interval_secs = period.as_secs_f64(), "polling scheduled");
    }

    /// Stop future refreshes for `device`.
    ///
    /// A refresh already in flight is allowed to finish. Returns whether
    /// the device was scheduled.
    pub fn unregister(&self, device: &DeviceKey) -> bool {
        match self.tasks.remove(device) {
            Some((_, task)) => {
                task.cancel.cancel();
                debug!(device = %device, "polling cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, device: &DeviceKey) -> bool {
        self.tasks.contains_key(device)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cancel every task and wait for all of them to exit.
    pub async fn shutdown(&self) {
        let keys: Vec<DeviceKey> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, task)) = self.tasks.remove(&key) {
                task.cancel.cancel();
                handles.push(task.handle);
            }
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("devices", &self.tasks.len())
            .finish()
    }
}

/// Where a poll task is registered, so it can remove itself on exit.
struct Registration {
    tasks: TaskMap,
    generation: u64,
    armed: oneshot::Receiver<()>,
}

/// Periodically refresh one device until cancelled or its session closes.
async fn poll_task(
    session: DeviceSession,
    period: Duration,
    cancel: CancellationToken,
    registration: Registration,
) {
    let Registration {
        tasks,
        generation,
        armed,
    } = registration;
    let _ = armed.await;

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                trace!(device = %session.key(), "poll tick");
                // Other failures are logged by the session; polling continues.
                if let Err(CoreError::SessionClosed { .. }) = session.refresh().await {
                    break;
                }
            }
        }
    }

    // A replacement registered under the same key has a newer generation.
    if tasks
        .remove_if(session.key(), |_, task| task.generation == generation)
        .is_some()
    {
        debug!(device = %session.key(), "session closed, polling dropped");
    }
    debug!(device = %session.key(), "poll task exited");
}
