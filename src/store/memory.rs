//! In-memory record store
//!
//! Per-series vectors behind an async `RwLock`. Used by tests and available
//! as a backend where durability is not required.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::codec::{SeriesTable, TimeSeriesRecord};

use super::{QueryFilter, RecordStore, StoreError};

/// Non-durable store keeping every record in process memory
pub struct MemoryStore {
    series: RwLock<HashMap<String, Vec<TimeSeriesRecord>>>,
}

impl MemoryStore {
    /// Create a store with one empty partition per known series
    pub fn new(table: &SeriesTable) -> Self {
        let series = table
            .names()
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        Self {
            series: RwLock::new(series),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, series: &str, record: TimeSeriesRecord) -> Result<(), StoreError> {
        let mut partitions = self.series.write().await;
        let partition = partitions
            .get_mut(series)
            .ok_or_else(|| StoreError::UnknownSeries(series.to_string()))?;
        partition.push(record);
        Ok(())
    }

    async fn query(
        &self,
        series: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        let partitions = self.series.read().await;
        let partition = partitions
            .get(series)
            .ok_or_else(|| StoreError::UnknownSeries(series.to_string()))?;

        let mut matched: Vec<TimeSeriesRecord> = partition
            .iter()
            .filter(|r| filter.matches(r.timestamp))
            .copied()
            .collect();

        matched.sort_by_key(|r| r.timestamp);
        if filter.descending() {
            matched.reverse();
        }

        Ok(matched
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }
}
