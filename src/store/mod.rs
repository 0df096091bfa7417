//! Time-series record store
//!
//! The store keeps one partition per known series and supports the one query
//! shape the bridge needs: optional inclusive time range, timestamp sort,
//! skip/limit pagination. Two backends: [`MemoryStore`] for tests and
//! non-durable deployments, [`SqliteStore`] for durable storage.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::codec::TimeSeriesRecord;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Fixed page size for historical queries
pub const PAGE_SIZE: i64 = 10;

/// Error type for store operations
#[derive(Debug)]
pub enum StoreError {
    /// The series is not part of the known-series table
    UnknownSeries(String),
    /// Backend failure (connection, statement, corrupt row)
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownSeries(name) => write!(f, "Unknown series: {:?}", name),
            StoreError::Backend(msg) => write!(f, "Store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// A bounded store query
///
/// Constructed per request, never persisted. The page is clamped to `>= 1`
/// at construction so the skip offset is always non-negative.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    page: i64,
    descending: bool,
}

impl QueryFilter {
    /// Unrestricted filter for the "by page" query variant, newest first
    pub fn by_page(page: i64) -> Self {
        Self {
            start: None,
            end: None,
            page: page.max(1),
            descending: true,
        }
    }

    /// Time-range filter; bounds are inclusive on both ends
    ///
    /// With `end` absent the filter is `timestamp >= start`.
    pub fn range(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        page: i64,
        descending: bool,
    ) -> Self {
        Self {
            start: Some(start),
            end,
            page: page.max(1),
            descending,
        }
    }

    /// Inclusive lower bound, if any
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Inclusive upper bound, if any
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Requested page, 1-indexed and clamped
    pub fn page(&self) -> i64 {
        self.page
    }

    /// Whether results are sorted newest first
    pub fn descending(&self) -> bool {
        self.descending
    }

    /// Records skipped after sorting
    pub fn offset(&self) -> i64 {
        PAGE_SIZE * (self.page - 1)
    }

    /// Maximum records returned
    pub fn limit(&self) -> i64 {
        PAGE_SIZE
    }

    /// Whether a timestamp falls inside the filter bounds
    pub fn matches(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp > end {
                return false;
            }
        }
        true
    }
}

/// Storage backend for time-series records
///
/// Concurrent reads and writes are safe under the backend's own concurrency
/// contract; the bridge adds no coordination of its own.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a record to the named series partition
    async fn insert(&self, series: &str, record: TimeSeriesRecord) -> Result<(), StoreError>;

    /// Return one sorted page of records matching the filter
    ///
    /// No matches yields an empty vec, never an error.
    async fn query(
        &self,
        series: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError>;
}
