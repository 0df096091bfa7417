//! Hub command stream
//!
//! The three event sources of the hub (register, unregister, broadcast) are
//! multiplexed into one ordered command channel. Processing one command fully
//! before the next is what makes the registry safe without a lock.

use crate::codec::InboundMessage;

use super::subscriber::{Subscriber, SubscriberId};

/// A command for the hub control loop
#[derive(Debug)]
pub enum HubCommand {
    /// Add a subscriber to the registry
    Register(Subscriber),
    /// Remove a subscriber and close its outbound queue (no-op if absent)
    Unregister(SubscriberId),
    /// Deliver a message to every registered subscriber
    Broadcast(InboundMessage),
    /// Unregister every subscriber and stop the control loop
    Shutdown,
}
