//! Telemetry fan-out and time-series bridge
//!
//! `telebridge` takes a stream of inbound telemetry messages (handed over by
//! an external pub/sub broker, one decoded message per callback) and bridges
//! it to two consumers:
//!
//! - a dynamic set of live WebSocket subscribers, fanned out without ever
//!   blocking on a single slow subscriber, and
//! - a durable time-series store queried through a paginated, time-range
//!   HTTP interface.
//!
//! # Architecture
//!
//! ```text
//!   broker callback ──► Ingest ──┬──► FanoutHub ──► per-subscriber queues ──► WebSocket
//!                                └──► PersistenceSink ──► RecordStore
//!
//!   HTTP client ──► QueryService ──► RecordStore
//! ```
//!
//! The two paths are independent: there is no ordering guarantee between a
//! message reaching live subscribers and the moment (or whether) it is
//! durably stored. The live path has no replay: a disconnected subscriber
//! loses messages, and a new one only sees broadcasts after its
//! registration.
//!
//! # Example
//!
//! ```no_run
//! use telebridge::{Bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> telebridge::Result<()> {
//!     let config = BridgeConfig::default().sqlite("telemetry.db");
//!     let bridge = Bridge::new(config).start().await?;
//!
//!     // Wire the external broker's "message arrived" callback here
//!     let ingest = bridge.ingest();
//!     ingest.dispatch("temperature", "23.5").await.ok();
//!
//!     tokio::signal::ctrl_c().await?;
//!     bridge.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod archive;
pub mod codec;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod query;
pub mod server;
pub mod sink;
pub mod store;
pub mod ws;

pub use codec::{InboundMessage, SeriesTable, TimeSeriesRecord};
pub use error::{Error, Result};
pub use hub::{FanoutHub, HubHandle};
pub use ingest::Ingest;
pub use query::QueryService;
pub use server::{Bridge, BridgeConfig, BridgeHandle, StoreBackend};
pub use sink::PersistenceSink;
pub use store::{MemoryStore, RecordStore, SqliteStore};
