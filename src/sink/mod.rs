//! Persistence sink
//!
//! Single long-lived consumer of the persistence queue. Decodes each message
//! and appends it to the matching series partition. Failures are local to
//! one message: unknown topics are discarded, decode and write failures are
//! logged and the loop continues. At-least-once and best-effort: no retry,
//! no backpressure signal back to the producer.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::{InboundMessage, SeriesTable};
use crate::store::RecordStore;

/// Queue consumer writing decoded records to the store
pub struct PersistenceSink {
    messages: mpsc::Receiver<InboundMessage>,
    store: Arc<dyn RecordStore>,
    series: SeriesTable,
}

impl PersistenceSink {
    /// Create a sink draining `messages` into `store`
    pub fn new(
        messages: mpsc::Receiver<InboundMessage>,
        store: Arc<dyn RecordStore>,
        series: SeriesTable,
    ) -> Self {
        Self {
            messages,
            store,
            series,
        }
    }

    /// Run until the ingest side of the queue is dropped
    pub async fn run(mut self) {
        tracing::debug!("Persistence sink started");

        while let Some(message) = self.messages.recv().await {
            if !self.series.contains(&message.topic) {
                tracing::trace!(topic = %message.topic, "Ignoring unknown topic");
                continue;
            }

            let record = match message.decode() {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable message");
                    continue;
                }
            };

            if let Err(e) = self.store.insert(&message.topic, record).await {
                tracing::error!(
                    series = %message.topic,
                    error = %e,
                    "Store write failed, dropping record"
                );
            }
        }

        tracing::info!("Persistence sink stopped");
    }
}
