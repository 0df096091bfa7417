//! Subscriber handles and connection lifecycle gate
//!
//! Each live subscriber is represented twice: the hub keeps a [`Subscriber`]
//! (the producing end of the outbound queue), the connection adapter keeps a
//! [`SubscriberSession`] (the consuming end). Both share a [`ConnectionGate`]
//! so that teardown fires exactly once no matter which side detects failure
//! first.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::InboundMessage;

/// Opaque subscriber identifier, unique per hub
pub type SubscriberId = u64;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and receiving broadcasts
    Active,
    /// Teardown initiated; queue closed or closing
    Closing,
    /// Adapter loops exited. Terminal, no resurrection.
    Closed,
}

const STATE_ACTIVE: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Single-fire teardown gate shared by the hub and the adapter loops
///
/// The first caller of [`begin_close`](Self::begin_close) wins; every later
/// caller observes `Closing`/`Closed` and backs off. A double-close is a
/// no-op by construction.
#[derive(Debug)]
pub struct ConnectionGate(AtomicU8);

impl ConnectionGate {
    /// Create a gate in the `Active` state
    pub fn new() -> Self {
        Self(AtomicU8::new(STATE_ACTIVE))
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        match self.0.load(Ordering::Acquire) {
            STATE_ACTIVE => ConnectionState::Active,
            STATE_CLOSING => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    /// Whether the connection is still active
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Transition `Active -> Closing`
    ///
    /// Returns `true` for exactly one caller.
    pub fn begin_close(&self) -> bool {
        self.0
            .compare_exchange(
                STATE_ACTIVE,
                STATE_CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Mark the connection fully closed once the adapter loops have exited
    pub fn finish_close(&self) {
        self.0.store(STATE_CLOSED, Ordering::Release);
    }
}

impl Default for ConnectionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The hub-owned side of a subscriber
///
/// The outbound queue is only ever written by the hub; dropping this value
/// closes the queue, which is the termination signal for the adapter's
/// writer loop.
#[derive(Debug)]
pub struct Subscriber {
    /// Unique identifier
    pub id: SubscriberId,
    /// Producing end of the bounded outbound queue
    pub queue: mpsc::Sender<InboundMessage>,
    /// Shared teardown gate
    pub gate: Arc<ConnectionGate>,
}

/// The adapter-owned side of a subscriber
#[derive(Debug)]
pub struct SubscriberSession {
    /// Unique identifier
    pub id: SubscriberId,
    /// Consuming end of the outbound queue
    pub outbound: mpsc::Receiver<InboundMessage>,
    /// Shared teardown gate
    pub gate: Arc<ConnectionGate>,
}
