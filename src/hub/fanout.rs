//! Hub control loop and handle
//!
//! [`FanoutHub`] is the single consumer of the command channel; [`HubHandle`]
//! is the cloneable producer side handed to the ingest dispatcher and the
//! connection-accepting layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::codec::InboundMessage;

use super::command::HubCommand;
use super::subscriber::{ConnectionGate, Subscriber, SubscriberId, SubscriberSession};

/// Error type for hub handle operations
#[derive(Debug, Clone)]
pub enum HubError {
    /// The hub control loop has stopped
    HubStopped,
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::HubStopped => write!(f, "Hub control loop has stopped"),
        }
    }
}

impl std::error::Error for HubError {}

/// Shared hub counters, updated only by the control loop
#[derive(Debug, Default)]
struct HubCounters {
    subscribers: AtomicUsize,
    peak_subscribers: AtomicUsize,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time view of the hub counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Highest subscriber count observed over the hub's lifetime
    pub peak_subscribers: usize,
    /// Broadcast commands processed
    pub broadcasts: u64,
    /// Messages enqueued to subscriber queues
    pub deliveries: u64,
    /// Subscribers evicted for a full outbound queue
    pub evictions: u64,
}

/// Cloneable producer side of the hub
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
    next_subscriber_id: Arc<AtomicU64>,
    counters: Arc<HubCounters>,
}

impl HubHandle {
    /// Register a new live subscriber
    ///
    /// Creates the bounded outbound queue and the shared teardown gate, then
    /// hands the producing side to the hub. Returns the adapter side.
    pub async fn register(&self, queue_capacity: usize) -> Result<SubscriberSession, HubError> {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let gate = Arc::new(ConnectionGate::new());

        let subscriber = Subscriber {
            id,
            queue: tx,
            gate: Arc::clone(&gate),
        };

        self.commands
            .send(HubCommand::Register(subscriber))
            .await
            .map_err(|_| HubError::HubStopped)?;

        Ok(SubscriberSession {
            id,
            outbound: rx,
            gate,
        })
    }

    /// Request removal of a subscriber
    ///
    /// Safe to call more than once; a missing subscriber is a no-op. A
    /// stopped hub is ignored, since every queue is already closed then.
    pub async fn unregister(&self, id: SubscriberId) {
        let _ = self.commands.send(HubCommand::Unregister(id)).await;
    }

    /// Broadcast a message to every registered subscriber
    ///
    /// Awaits queue space on the hub command channel. A full channel blocks
    /// the caller, which is the deliberate backpressure point toward the
    /// upstream transport.
    pub async fn broadcast(&self, message: InboundMessage) -> Result<(), HubError> {
        self.commands
            .send(HubCommand::Broadcast(message))
            .await
            .map_err(|_| HubError::HubStopped)
    }

    /// Ask the control loop to unregister everyone and stop
    pub async fn shutdown(&self) {
        let _ = self.commands.send(HubCommand::Shutdown).await;
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.counters.subscribers.load(Ordering::Relaxed)
    }

    /// Snapshot of the hub counters
    pub fn stats(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            subscribers: self.counters.subscribers.load(Ordering::Relaxed),
            peak_subscribers: self.counters.peak_subscribers.load(Ordering::Relaxed),
            broadcasts: self.counters.broadcasts.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}

/// The hub control loop
///
/// Owns the registry exclusively. Run with [`run`](Self::run) on its own
/// task; all interaction goes through the [`HubHandle`].
pub struct FanoutHub {
    commands: mpsc::Receiver<HubCommand>,
    registry: HashMap<SubscriberId, Subscriber>,
    counters: Arc<HubCounters>,
}

impl FanoutHub {
    /// Create a hub and its handle
    ///
    /// `command_capacity` bounds the merged register/unregister/broadcast
    /// stream and thereby the ingress backpressure point.
    pub fn new(command_capacity: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(command_capacity.max(1));
        let counters = Arc::new(HubCounters::default());

        let hub = Self {
            commands: rx,
            registry: HashMap::new(),
            counters: Arc::clone(&counters),
        };
        let handle = HubHandle {
            commands: tx,
            next_subscriber_id: Arc::new(AtomicU64::new(1)),
            counters,
        };

        (hub, handle)
    }

    /// Run the control loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("Fan-out hub started");

        while let Some(command) = self.commands.recv().await {
            if !self.apply(command) {
                break;
            }
        }

        self.close_all();
        tracing::info!("Fan-out hub stopped");
    }

    /// Apply one command; returns `false` on shutdown
    fn apply(&mut self, command: HubCommand) -> bool {
        match command {
            HubCommand::Register(subscriber) => {
                tracing::debug!(subscriber = subscriber.id, "Subscriber registered");
                self.registry.insert(subscriber.id, subscriber);
                self.sync_count();
            }
            HubCommand::Unregister(id) => {
                self.remove(id, "unregistered");
            }
            HubCommand::Broadcast(message) => {
                self.broadcast(message);
            }
            HubCommand::Shutdown => return false,
        }
        true
    }

    /// Deliver one message to every subscriber without blocking on any of them
    fn broadcast(&mut self, message: InboundMessage) {
        self.counters.broadcasts.fetch_add(1, Ordering::Relaxed);

        let mut evicted: Vec<SubscriberId> = Vec::new();
        let mut closed: Vec<SubscriberId> = Vec::new();

        for (id, subscriber) in &self.registry {
            match subscriber.queue.try_send(message.clone()) {
                Ok(()) => {
                    self.counters.deliveries.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber = id,
                        topic = %message.topic,
                        "Outbound queue full, evicting slow subscriber"
                    );
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    closed.push(*id);
                }
            }
        }

        for id in evicted {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            self.remove(id, "evicted");
        }
        for id in closed {
            self.remove(id, "queue closed");
        }
    }

    /// Remove a subscriber if present and close its outbound queue
    ///
    /// Dropping the `Subscriber` drops the queue sender, which the adapter's
    /// writer loop observes as end-of-queue after draining.
    fn remove(&mut self, id: SubscriberId, reason: &str) {
        match self.registry.remove(&id) {
            Some(subscriber) => {
                subscriber.gate.begin_close();
                tracing::debug!(subscriber = id, reason, "Subscriber removed");
            }
            None => {
                // Double-unregister is expected when both adapter loops
                // detect the same failure.
                tracing::trace!(subscriber = id, "Unregister for unknown subscriber");
            }
        }
        self.sync_count();
    }

    fn close_all(&mut self) {
        for (id, subscriber) in self.registry.drain() {
            subscriber.gate.begin_close();
            tracing::debug!(subscriber = id, "Subscriber closed on hub shutdown");
        }
        self.sync_count();
    }

    fn sync_count(&self) {
        let count = self.registry.len();
        self.counters.subscribers.store(count, Ordering::Relaxed);
        self.counters
            .peak_subscribers
            .fetch_max(count, Ordering::Relaxed);
    }
}
