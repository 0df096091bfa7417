//! Fan-out hub for live subscribers
//!
//! The hub owns the registry of connected subscribers and routes every
//! broadcast message to each of them. All registry mutation and all broadcast
//! iteration happen on one control loop consuming a single command channel,
//! so the registry needs no lock.
//!
//! # Architecture
//!
//! ```text
//!                       FanoutHub (one task)
//!                  ┌──────────────────────────┐
//!   HubHandle ───► │ commands: mpsc::Receiver │
//!   (Register,     │ registry: HashMap<Id,    │
//!    Unregister,   │   Subscriber {           │
//!    Broadcast)    │     queue: mpsc::Sender, │
//!                  │     gate,                │
//!                  │   }>                     │
//!                  └────────────┬─────────────┘
//!                               │ try_send per subscriber
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!         [Adapter]        [Adapter]        [Adapter]
//!         queue.recv()     queue.recv()     queue.recv()
//! ```
//!
//! # Overflow policy
//!
//! Broadcast never blocks on a subscriber. A full outbound queue marks that
//! subscriber unresponsive: it is evicted and its queue closed, while the
//! remaining subscribers receive the message unaffected. Per-subscriber
//! delivery order equals broadcast order (FIFO queue); there is no ordering
//! guarantee across subscribers or against the persistence path.

pub mod command;
pub mod fanout;
pub mod subscriber;

pub use command::HubCommand;
pub use fanout::{FanoutHub, HubHandle, HubStatsSnapshot};
pub use subscriber::{ConnectionGate, ConnectionState, Subscriber, SubscriberId, SubscriberSession};
