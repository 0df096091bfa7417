//! Bridge configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::SeriesTable;

/// Storage backend selection
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Keep records in process memory (lost on restart)
    Memory,
    /// Persist records to a SQLite database file
    Sqlite(PathBuf),
}

/// Bridge configuration options
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: SocketAddr,

    /// Known telemetry series (topic names)
    pub series: SeriesTable,

    /// Storage backend for persisted records
    pub store: StoreBackend,

    /// Capacity of the hub command queue (the ingress backpressure point)
    pub hub_queue_capacity: usize,

    /// Capacity of the persistence queue (absorbs bursts against a slow store)
    pub persistence_queue_capacity: usize,

    /// Capacity of each subscriber's outbound queue; a full queue evicts
    /// that subscriber
    pub subscriber_queue_capacity: usize,

    /// Interval between keepalive pings on idle subscriber connections
    pub keepalive_interval: Duration,

    /// How long a subscriber connection may stay silent before it is
    /// treated as half-open
    pub subscriber_idle_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            series: SeriesTable::default(),
            store: StoreBackend::Memory,
            hub_queue_capacity: 256,
            persistence_queue_capacity: 1024,
            subscriber_queue_capacity: 64,
            keepalive_interval: Duration::from_secs(30),
            subscriber_idle_timeout: Duration::from_secs(75),
        }
    }
}

impl BridgeConfig {
    /// Create a config with a custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the known series table
    pub fn series(mut self, series: SeriesTable) -> Self {
        self.series = series;
        self
    }

    /// Persist records to the given SQLite file
    pub fn sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = StoreBackend::Sqlite(path.into());
        self
    }

    /// Keep records in memory only
    pub fn memory(mut self) -> Self {
        self.store = StoreBackend::Memory;
        self
    }

    /// Set the per-subscriber outbound queue capacity
    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity.max(1);
        self
    }

    /// Set the keepalive ping interval
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the subscriber idle timeout
    pub fn subscriber_idle_timeout(mut self, timeout: Duration) -> Self {
        self.subscriber_idle_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.series.contains("temperature"));
        assert!(config.series.contains("humidity"));
        assert!(matches!(config.store, StoreBackend::Memory));
        assert_eq!(config.subscriber_queue_capacity, 64);
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = BridgeConfig::default()
            .bind(addr)
            .sqlite("/tmp/bridge.db")
            .subscriber_queue_capacity(8)
            .keepalive_interval(Duration::from_secs(10))
            .subscriber_idle_timeout(Duration::from_secs(25));

        assert_eq!(config.bind_addr, addr);
        assert!(matches!(config.store, StoreBackend::Sqlite(_)));
        assert_eq!(config.subscriber_queue_capacity, 8);
        assert_eq!(config.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.subscriber_idle_timeout, Duration::from_secs(25));
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = BridgeConfig::default().subscriber_queue_capacity(0);

        assert_eq!(config.subscriber_queue_capacity, 1);
    }
}
