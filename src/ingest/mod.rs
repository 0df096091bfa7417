//! Ingress dispatcher
//!
//! The hand-off point from the external transport's "message arrived"
//! callback into the pipeline's own concurrency domain. Each message is
//! duplicated to the fan-out hub and to the persistence queue; both queues
//! are bounded, so a saturated pipeline blocks the caller. That is the
//! deliberate backpressure point for overall system overload.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::InboundMessage;
use crate::hub::HubHandle;

/// Error type for the ingress dispatcher
#[derive(Debug, Clone)]
pub enum IngestError {
    /// Hub or persistence sink is no longer running
    PipelineClosed,
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::PipelineClosed => write!(f, "Pipeline has shut down"),
        }
    }
}

impl std::error::Error for IngestError {}

/// Cloneable ingress handle for the external broker callback
///
/// Holds the producing ends of both pipeline queues. Dropping every clone
/// closes the persistence queue and lets the sink drain and exit.
#[derive(Debug, Clone)]
pub struct Ingest {
    hub: HubHandle,
    sink: mpsc::Sender<InboundMessage>,
}

impl Ingest {
    pub(crate) fn new(hub: HubHandle, sink: mpsc::Sender<InboundMessage>) -> Self {
        Self { hub, sink }
    }

    /// Dispatch one inbound message to both pipeline paths
    ///
    /// Suspends only while enqueueing; no I/O happens on the caller's task.
    /// There is no ordering guarantee between the live-broadcast path and
    /// the persistence path.
    pub async fn dispatch(
        &self,
        topic: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Result<(), IngestError> {
        let message = InboundMessage::new(topic, payload);
        tracing::trace!(topic = %message.topic, "Message arrived");

        self.hub
            .broadcast(message.clone())
            .await
            .map_err(|_| IngestError::PipelineClosed)?;
        self.sink
            .send(message)
            .await
            .map_err(|_| IngestError::PipelineClosed)?;
        Ok(())
    }
}
