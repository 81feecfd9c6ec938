// ── Change notifier ──
//
// Per-device event bus. Each device key owns one broadcast topic;
// publishers never wait on subscribers, and a subscriber that falls
// behind sees its missed signals collapsed into one.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_core::Stream;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::model::{DeviceKey, OutletTarget};

const TOPIC_CAPACITY: usize = 32;

// ── Update ──────────────────────────────────────────────────────────

/// What changed on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// A read cycle replaced the snapshot.
    Refreshed,
    /// An outlet was switched (optimistically, before the device confirmed).
    Control { target: OutletTarget, on: bool },
    /// An outlet was power-cycled.
    Reset { target: OutletTarget },
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub device: DeviceKey,
    pub kind: UpdateKind,
    pub at: DateTime<Utc>,
}

// ── ChangeNotifier ──────────────────────────────────────────────────

/// Typed publish/subscribe hub keyed by [`DeviceKey`].
///
/// Cheaply cloneable; clones share the same topics.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    topics: Arc<DashMap<DeviceKey, broadcast::Sender<Update>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify every subscriber of `device`. Returns how many were reached.
    pub fn publish(&self, device: &DeviceKey, kind: UpdateKind) -> usize {
        let Some(tx) = self.topics.get(device) else {
            return 0;
        };
        let update = Update {
            device: device.clone(),
            kind,
            at: Utc::now(),
        };
        // Err only means nobody is listening right now.
        let reached = tx.send(update).unwrap_or(0);
        trace!(device = %device, ?kind, reached, "published update");
        reached
    }

    /// Subscribe as a receiver. Dropping it unsubscribes.
    ///
    /// Creates the device's topic if needed; it lives until [`remove`](Self::remove).
    /// [`DeviceManager`](crate::DeviceManager) only subscribes to registered
    /// devices, so its topics never outlive them.
    pub fn subscribe(&self, device: &DeviceKey) -> Subscription {
        let rx = self
            .topics
            .entry(device.clone())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        Subscription {
            device: device.clone(),
            rx,
        }
    }

    /// Subscribe with a callback run on its own task.
    ///
    /// The callback is never entered after [`SubscriptionHandle::unsubscribe`]
    /// returns. Requires a Tokio runtime.
    pub fn subscribe_fn<F>(&self, device: &DeviceKey, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Update) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe(device);
        let cancel = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));

        let task_cancel = cancel.clone();
        let task_gate = Arc::clone(&gate);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    update = subscription.recv() => {
                        let Some(update) = update else { break };
                        let _held = task_gate.lock().unwrap_or_else(PoisonError::into_inner);
                        if task_cancel.is_cancelled() {
                            break;
                        }
                        callback(&update);
                    }
                }
            }
            trace!(device = %subscription.device, "callback subscription ended");
        });

        SubscriptionHandle {
            device: device.clone(),
            cancel,
            gate,
            task_id: task.id(),
        }
    }

    /// Current number of live subscribers for `device`.
    pub fn subscriber_count(&self, device: &DeviceKey) -> usize {
        self.topics
            .get(device)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Close a device's topic, detaching every subscriber.
    pub fn remove(&self, device: &DeviceKey) {
        if self.topics.remove(device).is_some() {
            debug!(device = %device, "closed notification topic");
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("topics", &self.topics.len())
            .finish()
    }
}

// ── Subscription ────────────────────────────────────────────────────

/// Receiver half of a device subscription.
#[derive(Debug)]
pub struct Subscription {
    device: DeviceKey,
    rx: broadcast::Receiver<Update>,
}

impl Subscription {
    pub fn device(&self) -> &DeviceKey {
        &self.device
    }

    /// Wait for the next update. `None` once the topic is closed.
    ///
    /// If this receiver fell behind, everything it missed is collapsed
    /// into the most recent update still buffered.
    pub async fn recv(&mut self) -> Option<Update> {
        loop {
            match self.rx.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(missed)) => {
                    debug!(device = %self.device, missed, "subscriber lagged, coalescing");
                    if let Some(latest) = self.drain_latest() {
                        return Some(latest);
                    }
                }
            }
        }
    }

    fn drain_latest(&mut self) -> Option<Update> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(update) => latest = Some(update),
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => return latest,
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> UpdateStream {
        UpdateStream {
            inner: BroadcastStream::new(self.rx),
        }
    }
}

/// `Stream` adapter over a subscription. Lag gaps are skipped silently.
pub struct UpdateStream {
    inner: BroadcastStream<Update>,
}

impl Stream for UpdateStream {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(update))) => return Poll::Ready(Some(update)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(_)))) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ── SubscriptionHandle ──────────────────────────────────────────────

/// Handle to a callback subscription. Dropping it also unsubscribes.
#[derive(Debug)]
pub struct SubscriptionHandle {
    device: DeviceKey,
    cancel: CancellationToken,
    gate: Arc<Mutex<()>>,
    task_id: tokio::task::Id,
}

impl SubscriptionHandle {
    pub fn device(&self) -> &DeviceKey {
        &self.device
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop deliveries. Idempotent, and safe after the device is gone.
    ///
    /// Waits for a callback already running on another task to return.
    /// Calling this from inside the callback itself is allowed.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
        if tokio::task::try_id() != Some(self.task_id) {
            drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
