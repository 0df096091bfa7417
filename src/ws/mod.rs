//! Subscriber connection adapter
//!
//! Bridges a subscriber's outbound queue to its WebSocket connection with a
//! pair of concurrent loops: the writer drains the queue and keeps the
//! connection alive with periodic pings, the reader watches for close and
//! error signals from the peer. Application data flows one way (server to
//! client); inbound frames are control traffic only.
//!
//! Teardown is single-fire: whichever loop detects failure first wins the
//! [`ConnectionGate`](crate::hub::ConnectionGate) and routes removal through
//! the hub's unregister command, so the hub alone finalizes registry state.
//! The loser observes the gate already closed and backs off.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::codec::InboundMessage;
use crate::hub::{ConnectionGate, HubHandle, SubscriberId, SubscriberSession};

/// Run both adapter loops for one subscriber until the connection is done
///
/// `keepalive` is the ping interval on the writer side; `idle_timeout`
/// bounds how long the reader waits for any inbound frame (pongs included)
/// before treating the connection as half-open.
pub async fn serve_subscriber(
    socket: WebSocket,
    hub: HubHandle,
    session: SubscriberSession,
    keepalive: Duration,
    idle_timeout: Duration,
) {
    let SubscriberSession { id, outbound, gate } = session;
    let (sink, stream) = socket.split();

    let writer = tokio::spawn(writer_loop(
        sink,
        outbound,
        Arc::clone(&gate),
        hub.clone(),
        id,
        keepalive,
    ));
    let reader = tokio::spawn(reader_loop(
        stream,
        Arc::clone(&gate),
        hub.clone(),
        id,
        idle_timeout,
    ));

    let _ = writer.await;
    let _ = reader.await;

    gate.finish_close();
    tracing::debug!(subscriber = id, "Connection adapter exited");
}

/// Drain the outbound queue onto the wire
///
/// Exits on write failure (after initiating teardown) or when the hub closes
/// the queue, in which case any pending data was already drained and a close
/// frame ends the connection gracefully.
async fn writer_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<InboundMessage>,
    gate: Arc<ConnectionGate>,
    hub: HubHandle,
    id: SubscriberId,
    keepalive: Duration,
) {
    let mut ticker = tokio::time::interval(keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = outbound.recv() => match maybe {
                Some(message) => {
                    let frame = message.wire_frame();
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        tracing::debug!(subscriber = id, error = %e, "Write failed");
                        teardown(&gate, &hub, id, "write error").await;
                        return;
                    }
                }
                None => {
                    // Queue closed by the hub: graceful close handshake
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    tracing::debug!(subscriber = id, error = %e, "Keepalive failed");
                    teardown(&gate, &hub, id, "keepalive failure").await;
                    return;
                }
            }
        }
    }
}

/// Watch the peer for liveness and close/error signals
async fn reader_loop(
    mut stream: SplitStream<WebSocket>,
    gate: Arc<ConnectionGate>,
    hub: HubHandle,
    id: SubscriberId,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, stream.next()).await {
            Err(_) => {
                teardown(&gate, &hub, id, "idle timeout").await;
                return;
            }
            Ok(None) => {
                teardown(&gate, &hub, id, "connection closed").await;
                return;
            }
            Ok(Some(Err(e))) => {
                tracing::debug!(subscriber = id, error = %e, "Read failed");
                teardown(&gate, &hub, id, "read error").await;
                return;
            }
            Ok(Some(Ok(Message::Close(_)))) => {
                teardown(&gate, &hub, id, "close frame").await;
                return;
            }
            // Pongs and stray frames only refresh liveness
            Ok(Some(Ok(_))) => {}
        }
    }
}

/// Initiate teardown at most once per subscriber
///
/// The hub finalizes removal; unregister is idempotent, so losing the gate
/// race and doing nothing is always safe.
async fn teardown(gate: &ConnectionGate, hub: &HubHandle, id: SubscriberId, reason: &str) {
    if gate.begin_close() {
        tracing::debug!(subscriber = id, reason, "Tearing down subscriber connection");
        hub.unregister(id).await;
    }
}
