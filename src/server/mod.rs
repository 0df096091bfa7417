//! Bridge lifecycle
//!
//! [`Bridge`] wires the pipeline together with explicit, dependency-injected
//! queue handles and no module-level state. Startup order: store open, hub
//! start, sink start, listener start. Shutdown runs in reverse: the listener
//! stops accepting first, the hub unregisters every subscriber (closing
//! their queues so the adapter loops exit), then the persistence queue is
//! closed and drained with a bound.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api::{self, ApiState};
use crate::hub::{FanoutHub, HubHandle};
use crate::ingest::Ingest;
use crate::query::QueryService;
use crate::sink::PersistenceSink;
use crate::store::{MemoryStore, RecordStore, SqliteStore};

pub use config::{BridgeConfig, StoreBackend};

/// Bound on draining the persistence queue at shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The assembled but not yet started bridge
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge from its configuration
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Start every component and return the running bridge's handle
    ///
    /// Fails on startup-scoped errors only: store open failure or listener
    /// bind failure.
    pub async fn start(self) -> crate::error::Result<BridgeHandle> {
        let config = self.config;

        let store: Arc<dyn RecordStore> = match &config.store {
            StoreBackend::Memory => Arc::new(MemoryStore::new(&config.series)),
            StoreBackend::Sqlite(path) => Arc::new(SqliteStore::open(path, &config.series)?),
        };

        let (hub, hub_handle) = FanoutHub::new(config.hub_queue_capacity);
        let hub_task = tokio::spawn(hub.run());

        let (sink_tx, sink_rx) = mpsc::channel(config.persistence_queue_capacity.max(1));
        let sink = PersistenceSink::new(sink_rx, Arc::clone(&store), config.series.clone());
        let sink_task = tokio::spawn(sink.run());

        let ingest = Ingest::new(hub_handle.clone(), sink_tx);
        let query = QueryService::new(store);

        let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let state = ApiState::new(hub_handle.clone(), query.clone(), config.clone());
        let app = api::router(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let http_task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "HTTP server error");
            }
        });

        tracing::info!(addr = %local_addr, "Bridge listening");

        Ok(BridgeHandle {
            ingest,
            hub: hub_handle,
            query,
            local_addr,
            shutdown_tx,
            http_task,
            hub_task,
            sink_task,
        })
    }

    /// Start the bridge and run it until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> crate::error::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let handle = self.start().await?;
        shutdown.await;
        tracing::info!("Shutdown signal received");
        handle.shutdown().await;
        Ok(())
    }
}

/// Handle to a running bridge
pub struct BridgeHandle {
    ingest: Ingest,
    hub: HubHandle,
    query: QueryService,
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    http_task: JoinHandle<()>,
    hub_task: JoinHandle<()>,
    sink_task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Ingress handle for the external broker callback
    pub fn ingest(&self) -> Ingest {
        self.ingest.clone()
    }

    /// Hub handle (stats, subscriber count)
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Read-side query service
    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// Actual listener address (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the bridge in reverse startup order
    ///
    /// Ingest handles still held elsewhere keep the persistence queue open;
    /// the drain then ends at [`DRAIN_TIMEOUT`].
    pub async fn shutdown(self) {
        tracing::info!("Bridge shutting down");

        // Stop accepting new connections and requests first
        let _ = self.shutdown_tx.send(());
        let _ = self.http_task.await;

        // Unregister every subscriber and stop the hub loop
        self.hub.shutdown().await;
        let _ = self.hub_task.await;

        // Close our end of the persistence queue and let the sink drain
        drop(self.ingest);
        if tokio::time::timeout(DRAIN_TIMEOUT, self.sink_task)
            .await
            .is_err()
        {
            tracing::warn!("Persistence sink did not drain in time");
        }

        tracing::info!("Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    async fn started_bridge() -> BridgeHandle {
        let config = BridgeConfig::with_addr("127.0.0.1:0".parse().unwrap());
        Bridge::new(config).start().await.unwrap()
    }

    async fn wait_for<F: Fn() -> bool>(what: &str, check: F) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {}", what);
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let result = Bridge::new(BridgeConfig::with_addr(addr)).start().await;
        assert!(matches!(result, Err(crate::error::Error::Io(_))));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let handle = started_bridge().await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_to_store_round_trip() {
        let handle = started_bridge().await;
        let ingest = handle.ingest();

        ingest.dispatch("temperature", "23.5").await.unwrap();

        let query = handle.query().clone();
        for _ in 0..200 {
            let records = query.records_by_page("temperature", 1).await.unwrap();
            if !records.is_empty() {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].payload, 23.5);
                handle.shutdown().await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("record never reached the store");
    }

    #[tokio::test]
    async fn test_live_subscriber_receives_broadcast() {
        let handle = started_bridge().await;
        let ingest = handle.ingest();

        let url = format!("ws://{}/ws", handle.local_addr());
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        // A subscriber only sees messages broadcast after registration
        let hub = handle.hub().clone();
        wait_for("subscriber registration", || hub.subscriber_count() == 1).await;

        ingest.dispatch("temperature", "23.5").await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = frame.into_text().unwrap();
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["topic"], "temperature");
        assert_eq!(json["payload"], "23.5");

        // Shutdown closes the subscriber queue; the connection ends cleanly
        handle.shutdown().await;
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match socket.next().await {
                    None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }

    #[tokio::test]
    async fn test_client_disconnect_unregisters() {
        let handle = started_bridge().await;

        let url = format!("ws://{}/ws", handle.local_addr());
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let hub = handle.hub().clone();
        wait_for("subscriber registration", || hub.subscriber_count() == 1).await;

        socket.close(None).await.unwrap();
        wait_for("subscriber removal", || hub.subscriber_count() == 0).await;

        handle.shutdown().await;
    }
}
