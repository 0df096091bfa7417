//! Historical query service
//!
//! Translates a `(start, end, page, sort-order)` request into a bounded
//! store query and returns one ordered page of records. Independent of the
//! live fan-out path.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::codec::TimeSeriesRecord;
use crate::store::{QueryFilter, RecordStore, StoreError};

/// Read-side facade over the record store
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RecordStore>,
}

impl QueryService {
    /// Create a service over the given store
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All records of a series, newest first, 10 per page
    ///
    /// `page` is 1-indexed; values below 1 are treated as page 1.
    pub async fn records_by_page(
        &self,
        series: &str,
        page: i64,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        self.store.query(series, &QueryFilter::by_page(page)).await
    }

    /// Records of a series inside an inclusive time range
    ///
    /// With `end` absent the filter is `timestamp >= start`. Descending
    /// (newest first) unless `descending` is false.
    pub async fn records_in_range(
        &self,
        series: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        page: i64,
        descending: bool,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        self.store
            .query(series, &QueryFilter::range(start, end, page, descending))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SeriesTable;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    async fn service_with(count: u32) -> QueryService {
        let store = Arc::new(MemoryStore::new(&SeriesTable::default()));
        for minute in 0..count {
            store
                .insert(
                    "temperature",
                    TimeSeriesRecord {
                        payload: minute as f64,
                        timestamp: Utc.with_ymd_and_hms(2022, 1, 1, 0, minute, 0).unwrap(),
                    },
                )
                .await
                .unwrap();
        }
        QueryService::new(store)
    }

    #[tokio::test]
    async fn test_page_zero_treated_as_page_one() {
        let service = service_with(15).await;

        let clamped = service.records_by_page("temperature", 0).await.unwrap();
        let first = service.records_by_page("temperature", 1).await.unwrap();

        assert_eq!(clamped, first);
        assert_eq!(clamped.len(), 10);
        assert_eq!(clamped[0].payload, 14.0);
    }

    #[tokio::test]
    async fn test_pages_cover_all_records_disjointly() {
        let service = service_with(15).await;

        let page1 = service.records_by_page("temperature", 1).await.unwrap();
        let page2 = service.records_by_page("temperature", 2).await.unwrap();

        assert_eq!(page1.len() + page2.len(), 15);
        for r in &page1 {
            assert!(!page2.contains(r));
        }
    }

    #[tokio::test]
    async fn test_no_data_is_empty_not_error() {
        let service = service_with(0).await;

        let records = service.records_by_page("humidity", 1).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_range_query_matches_exact_timestamps() {
        let service = service_with(10).await;
        let start = Utc.with_ymd_and_hms(2022, 1, 1, 0, 4, 0).unwrap();

        let records = service
            .records_in_range("temperature", start, Some(start), 1, true)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, 4.0);
    }
}
